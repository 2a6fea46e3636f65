//! Lexicon records and the query-time lexicon
//!
//! Two record kinds are stored on disk, both sorted by term:
//!
//! - block lexicon entries, written when a partial block is flushed;
//! - term information, written by the merger for the global index.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use log::info;
use serde::{Deserialize, Serialize};

use crate::base::{decode_text, encode_text, read_record, DocId, Len, TEXT_FIELD_LENGTH};
use crate::error::{Error, IoContext, Result};

pub const LEXICON_FILE: &str = "lexicon.dat";

/// Entry of a partial block lexicon
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLexiconEntry {
    pub term: String,
    /// Byte offset in the block document ID file
    pub offset_docids: u64,
    /// Byte offset in the block frequency file
    pub offset_freqs: u64,
    pub posting_list_length: u32,
}

impl BlockLexiconEntry {
    pub const RECORD_LENGTH: usize = TEXT_FIELD_LENGTH + 8 + 8 + 4;

    pub fn write_to(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        let mut record = [0u8; Self::RECORD_LENGTH];
        let mut ix = TEXT_FIELD_LENGTH;
        record[..ix].copy_from_slice(&encode_text(&self.term));
        BigEndian::write_u64(&mut record[ix..ix + 8], self.offset_docids);
        ix += 8;
        BigEndian::write_u64(&mut record[ix..ix + 8], self.offset_freqs);
        ix += 8;
        BigEndian::write_u32(&mut record[ix..ix + 4], self.posting_list_length);
        writer.write_all(&record)
    }

    /// Reads the next entry, or `None` at the end of the lexicon
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>> {
        let mut record = [0u8; Self::RECORD_LENGTH];
        if !read_record(reader, &mut record)? {
            return Ok(None);
        }

        let mut ix = TEXT_FIELD_LENGTH;
        let term = decode_text(&record[..ix])?;
        let offset_docids = BigEndian::read_u64(&record[ix..ix + 8]);
        ix += 8;
        let offset_freqs = BigEndian::read_u64(&record[ix..ix + 8]);
        ix += 8;
        let posting_list_length = BigEndian::read_u32(&record[ix..ix + 4]);

        Ok(Some(Self {
            term,
            offset_docids,
            offset_freqs,
            posting_list_length,
        }))
    }
}

/// Global information about a term
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TermInfo {
    pub term: String,

    /// Position for the document ID stream
    pub offset_docids: u64,

    /// Position for the frequency stream
    pub offset_freqs: u64,

    pub docids_byte_length: u32,
    pub freqs_byte_length: u32,

    /// Number of postings (document frequency)
    pub posting_list_length: u32,

    /// Inverse document frequency
    pub idf: f64,

    /// Byte offset of the first skip block
    pub offset_skipblocks: u64,
    pub num_skipblocks: u32,

    /// Maximum TFIDF term weight over the posting list
    pub tfidf_upper_bound: f32,

    /// Maximum BM25 term weight over the posting list
    pub bm25_upper_bound: f32,
}

impl std::fmt::Display for TermInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (docids: {}+{}, freqs: {}+{}, len: {}, idf: {:.4}, skips: {}@{}, bounds: {}/{})",
            self.term,
            self.offset_docids,
            self.docids_byte_length,
            self.offset_freqs,
            self.freqs_byte_length,
            self.posting_list_length,
            self.idf,
            self.num_skipblocks,
            self.offset_skipblocks,
            self.tfidf_upper_bound,
            self.bm25_upper_bound
        )
    }
}

impl TermInfo {
    /// term, 3 offsets (docids, freqs, skips), idf, 2 byte lengths,
    /// posting list length, skip count, 2 score bounds
    pub const RECORD_LENGTH: usize = TEXT_FIELD_LENGTH + 3 * 8 + 8 + 2 * 4 + 4 + 4 + 2 * 4;

    pub fn write_to(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        let mut record = [0u8; Self::RECORD_LENGTH];
        let mut ix = TEXT_FIELD_LENGTH;
        record[..ix].copy_from_slice(&encode_text(&self.term));
        BigEndian::write_u64(&mut record[ix..ix + 8], self.offset_docids);
        ix += 8;
        BigEndian::write_u64(&mut record[ix..ix + 8], self.offset_freqs);
        ix += 8;
        BigEndian::write_f64(&mut record[ix..ix + 8], self.idf);
        ix += 8;
        BigEndian::write_u32(&mut record[ix..ix + 4], self.docids_byte_length);
        ix += 4;
        BigEndian::write_u32(&mut record[ix..ix + 4], self.freqs_byte_length);
        ix += 4;
        BigEndian::write_u32(&mut record[ix..ix + 4], self.posting_list_length);
        ix += 4;
        BigEndian::write_u64(&mut record[ix..ix + 8], self.offset_skipblocks);
        ix += 8;
        BigEndian::write_u32(&mut record[ix..ix + 4], self.num_skipblocks);
        ix += 4;
        BigEndian::write_f32(&mut record[ix..ix + 4], self.tfidf_upper_bound);
        ix += 4;
        BigEndian::write_f32(&mut record[ix..ix + 4], self.bm25_upper_bound);
        writer.write_all(&record)
    }

    fn decode(record: &[u8]) -> Result<Self> {
        let mut ix = TEXT_FIELD_LENGTH;
        let term = decode_text(&record[..ix])?;
        let offset_docids = BigEndian::read_u64(&record[ix..ix + 8]);
        ix += 8;
        let offset_freqs = BigEndian::read_u64(&record[ix..ix + 8]);
        ix += 8;
        let idf = BigEndian::read_f64(&record[ix..ix + 8]);
        ix += 8;
        let docids_byte_length = BigEndian::read_u32(&record[ix..ix + 4]);
        ix += 4;
        let freqs_byte_length = BigEndian::read_u32(&record[ix..ix + 4]);
        ix += 4;
        let posting_list_length = BigEndian::read_u32(&record[ix..ix + 4]);
        ix += 4;
        let offset_skipblocks = BigEndian::read_u64(&record[ix..ix + 8]);
        ix += 8;
        let num_skipblocks = BigEndian::read_u32(&record[ix..ix + 4]);
        ix += 4;
        let tfidf_upper_bound = BigEndian::read_f32(&record[ix..ix + 4]);
        ix += 4;
        let bm25_upper_bound = BigEndian::read_f32(&record[ix..ix + 4]);

        Ok(Self {
            term,
            offset_docids,
            offset_freqs,
            docids_byte_length,
            freqs_byte_length,
            posting_list_length,
            idf,
            offset_skipblocks,
            num_skipblocks,
            tfidf_upper_bound,
            bm25_upper_bound,
        })
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>> {
        let mut record = [0u8; Self::RECORD_LENGTH];
        if !read_record(reader, &mut record)? {
            return Ok(None);
        }
        Self::decode(&record).map(Some)
    }
}

/// Term information for all the terms of the index
pub struct Lexicon {
    terms: HashMap<String, TermInfo>,
}

impl Lexicon {
    /// Loads the full lexicon in memory
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).context(|| format!("opening lexicon {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut terms = HashMap::new();

        while let Some(info) = TermInfo::read_from(&mut reader)? {
            terms.insert(info.term.clone(), info);
        }

        info!("Loaded {} terms from {}", terms.len(), path.display());
        Ok(Self { terms })
    }

    pub fn get(&self, term: &str) -> Option<&TermInfo> {
        self.terms.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermInfo> {
        self.terms.values()
    }
}

impl Len for Lexicon {
    fn len(&self) -> usize {
        self.terms.len()
    }
}

/// Binary search of a term in a sorted lexicon file, without loading it
pub fn find_term(path: &Path, term: &str) -> Result<Option<TermInfo>> {
    let mut file = File::open(path).context(|| format!("opening lexicon {}", path.display()))?;
    let size = file
        .metadata()
        .context(|| format!("reading metadata of {}", path.display()))?
        .len();
    let record_length = TermInfo::RECORD_LENGTH as u64;
    if size % record_length != 0 {
        return Err(Error::Corrupted(format!(
            "lexicon size {} is not a multiple of {}",
            size, record_length
        )));
    }

    // Terms are stored truncated
    let key = crate::base::normalize_term(term);
    let mut low = 0u64;
    let mut high = size / record_length;
    let mut record = [0u8; TermInfo::RECORD_LENGTH];

    while low < high {
        let middle = low + (high - low) / 2;
        file.seek(SeekFrom::Start(middle * record_length))
            .context(|| format!("seeking in {}", path.display()))?;
        file.read_exact(&mut record)
            .context(|| format!("reading {}", path.display()))?;
        let info = TermInfo::decode(&record)?;

        match info.term.as_str().cmp(key) {
            std::cmp::Ordering::Equal => return Ok(Some(info)),
            std::cmp::Ordering::Less => low = middle + 1,
            std::cmp::Ordering::Greater => high = middle,
        }
    }
    Ok(None)
}

/// Entry of the skip block table
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkipBlock {
    pub start_docid_offset: u64,
    pub docid_byte_length: u32,
    pub start_freq_offset: u64,
    pub freq_byte_length: u32,
    /// Largest document ID of the run
    pub max_docid: DocId,
}

impl std::fmt::Display for SkipBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(docids: {}+{}, freqs: {}+{}, max_docid: {})",
            self.start_docid_offset,
            self.docid_byte_length,
            self.start_freq_offset,
            self.freq_byte_length,
            self.max_docid
        )
    }
}

impl SkipBlock {
    pub const RECORD_LENGTH: usize = 8 + 4 + 8 + 4 + 8;

    pub fn write_to(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        let mut record = [0u8; Self::RECORD_LENGTH];
        BigEndian::write_u64(&mut record[0..8], self.start_docid_offset);
        BigEndian::write_u32(&mut record[8..12], self.docid_byte_length);
        BigEndian::write_u64(&mut record[12..20], self.start_freq_offset);
        BigEndian::write_u32(&mut record[20..24], self.freq_byte_length);
        BigEndian::write_u64(&mut record[24..32], self.max_docid);
        writer.write_all(&record)
    }

    pub fn decode(record: &[u8]) -> Self {
        Self {
            start_docid_offset: BigEndian::read_u64(&record[0..8]),
            docid_byte_length: BigEndian::read_u32(&record[8..12]),
            start_freq_offset: BigEndian::read_u64(&record[12..20]),
            freq_byte_length: BigEndian::read_u32(&record[20..24]),
            max_docid: BigEndian::read_u64(&record[24..32]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_lengths() {
        assert_eq!(BlockLexiconEntry::RECORD_LENGTH, 68);
        assert_eq!(TermInfo::RECORD_LENGTH, 104);
        assert_eq!(SkipBlock::RECORD_LENGTH, 32);
    }

    #[test]
    fn term_info_record() {
        let info = TermInfo {
            term: "retrieval".to_string(),
            offset_docids: 1024,
            offset_freqs: 512,
            docids_byte_length: 30,
            freqs_byte_length: 12,
            posting_list_length: 12,
            idf: 1.25,
            offset_skipblocks: 64,
            num_skipblocks: 4,
            tfidf_upper_bound: 2.5,
            bm25_upper_bound: 3.75,
        };
        let mut data = Vec::new();
        info.write_to(&mut data).unwrap();
        assert_eq!(data.len(), TermInfo::RECORD_LENGTH);

        let mut reader = &data[..];
        assert_eq!(TermInfo::read_from(&mut reader).unwrap(), Some(info));
        assert_eq!(TermInfo::read_from(&mut reader).unwrap(), None);
    }
}
