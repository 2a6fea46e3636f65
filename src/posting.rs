//! Posting list readers
//!
//! A posting list is stored as contiguous runs in the document ID and
//! frequency streams. When the merger wrote skip blocks, each run is
//! described by a `SkipBlock` and is decoded only when the iterator
//! reaches it; otherwise the whole list is a single run.

use std::path::Path;

use log::debug;

use crate::base::{DocId, Posting, TermFrequency};
use crate::compress::{expect_length, Compression};
use crate::error::{Error, Result};
use crate::lexicon::{SkipBlock, TermInfo};
use crate::utils::buffer::{open_buffer, Buffer};

pub const DOCIDS_FILE: &str = "docids.dat";
pub const FREQUENCIES_FILE: &str = "freqs.dat";
pub const SKIPS_FILE: &str = "skips.dat";

/// Forward-only iterator over a posting list
///
/// A freshly opened iterator is positioned on its first posting.
pub trait PostingIterator: Send {
    /// Returns the current posting (`None` once the list is over)
    fn current(&self) -> Option<Posting>;

    /// Moves to the next posting and returns it
    fn next(&mut self) -> Result<Option<Posting>>;

    /// Moves to the first posting whose document ID is greater or equal
    /// than `target`. Never moves backwards.
    fn next_geq(&mut self, target: DocId) -> Result<Option<Posting>>;

    /// True if another posting follows the current one
    fn has_next(&self) -> bool;

    /// Number of postings of the full list
    fn length(&self) -> usize;

    fn is_exhausted(&self) -> bool {
        self.current().is_none()
    }
}

/// The global posting streams of an index
pub struct PostingFiles {
    compression: Compression,
    docids: Box<dyn Buffer>,
    frequencies: Box<dyn Buffer>,
    skips: Box<dyn Buffer>,
}

impl PostingFiles {
    pub fn open(folder: &Path, compression: Compression, in_memory: bool) -> Result<Self> {
        Ok(Self {
            compression,
            docids: open_buffer(&folder.join(DOCIDS_FILE), in_memory)?,
            frequencies: open_buffer(&folder.join(FREQUENCIES_FILE), in_memory)?,
            skips: open_buffer(&folder.join(SKIPS_FILE), in_memory)?,
        })
    }

    pub fn from_buffers(
        compression: Compression,
        docids: Box<dyn Buffer>,
        frequencies: Box<dyn Buffer>,
        skips: Box<dyn Buffer>,
    ) -> Self {
        Self {
            compression,
            docids,
            frequencies,
            skips,
        }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Opens a reader on the posting list of a term
    pub fn reader<'a>(&'a self, info: &'a TermInfo) -> Result<PostingListReader<'a>> {
        PostingListReader::open(self, info)
    }

    /// Reads the skip block table of a term
    pub fn skip_blocks(&self, info: &TermInfo) -> Result<Vec<SkipBlock>> {
        let start = info.offset_skipblocks;
        let end = start + (info.num_skipblocks as u64) * (SkipBlock::RECORD_LENGTH as u64);
        let data = self.skips.slice(start, end)?;
        Ok(data
            .chunks_exact(SkipBlock::RECORD_LENGTH)
            .map(SkipBlock::decode)
            .collect())
    }

    /// Decodes a full posting list
    pub fn read_postings(&self, info: &TermInfo) -> Result<Vec<Posting>> {
        let mut reader = self.reader(info)?;
        let mut postings = Vec::with_capacity(info.posting_list_length as usize);
        while let Some(posting) = reader.current() {
            postings.push(posting);
            reader.next()?;
        }
        if postings.len() != info.posting_list_length as usize {
            return Err(Error::Corrupted(format!(
                "term {}: read {} postings instead of {}",
                info.term,
                postings.len(),
                info.posting_list_length
            )));
        }
        Ok(postings)
    }
}

/// Reads the posting list of one term, one run at a time
pub struct PostingListReader<'a> {
    files: &'a PostingFiles,
    info: &'a TermInfo,

    /// Runs of the posting list
    blocks: Vec<SkipBlock>,
    block_ix: usize,

    /// Decoded content of the current run
    docids: Vec<DocId>,
    frequencies: Vec<TermFrequency>,
    position: usize,

    no_more_postings: bool,
}

impl<'a> PostingListReader<'a> {
    pub fn open(files: &'a PostingFiles, info: &'a TermInfo) -> Result<Self> {
        let blocks = if info.num_skipblocks > 0 {
            files.skip_blocks(info)?
        } else {
            // The full list is one run
            vec![SkipBlock {
                start_docid_offset: info.offset_docids,
                docid_byte_length: info.docids_byte_length,
                start_freq_offset: info.offset_freqs,
                freq_byte_length: info.freqs_byte_length,
                max_docid: DocId::MAX,
            }]
        };

        let mut reader = Self {
            files,
            info,
            blocks,
            block_ix: 0,
            docids: Vec::new(),
            frequencies: Vec::new(),
            position: 0,
            no_more_postings: info.posting_list_length == 0,
        };

        if !reader.no_more_postings {
            reader.read_block(0)?;
            if info.num_skipblocks == 0 && reader.docids.len() != info.posting_list_length as usize
            {
                return Err(Error::Corrupted(format!(
                    "term {}: decoded {} postings instead of {}",
                    info.term,
                    reader.docids.len(),
                    info.posting_list_length
                )));
            }
        }
        Ok(reader)
    }

    /// Decodes a run and positions the iterator on its first posting
    fn read_block(&mut self, block_ix: usize) -> Result<()> {
        let block = self.blocks[block_ix];
        let compression = self.files.compression;

        let data = self.files.docids.slice(
            block.start_docid_offset,
            block.start_docid_offset + block.docid_byte_length as u64,
        )?;
        self.docids = compression.read::<DocId>(data)?;

        let data = self.files.frequencies.slice(
            block.start_freq_offset,
            block.start_freq_offset + block.freq_byte_length as u64,
        )?;
        self.frequencies = expect_length(
            compression.read::<TermFrequency>(data)?,
            self.docids.len(),
            "frequencies",
        )?;

        if self.docids.is_empty() {
            return Err(Error::Corrupted(format!(
                "empty run {} for term {}",
                block_ix, self.info.term
            )));
        }

        debug!("[{}] Loaded block {}: {}", self.info.term, block_ix, block);
        self.block_ix = block_ix;
        self.position = 0;
        Ok(())
    }

    /// Marks the iterator as over and releases the decoded run
    fn finish(&mut self) {
        debug!("[{}] EOF for blocks", self.info.term);
        self.no_more_postings = true;
        self.docids = Vec::new();
        self.frequencies = Vec::new();
    }

    pub fn term_info(&self) -> &TermInfo {
        self.info
    }

    /// Releases the decoded postings
    pub fn close(self) {}
}

impl<'a> PostingIterator for PostingListReader<'a> {
    fn current(&self) -> Option<Posting> {
        if self.no_more_postings {
            None
        } else {
            Some(Posting {
                docid: self.docids[self.position],
                frequency: self.frequencies[self.position],
            })
        }
    }

    fn next(&mut self) -> Result<Option<Posting>> {
        if self.no_more_postings {
            return Ok(None);
        }

        self.position += 1;
        if self.position >= self.docids.len() {
            if self.block_ix + 1 < self.blocks.len() {
                self.read_block(self.block_ix + 1)?;
            } else {
                self.finish();
            }
        }
        Ok(self.current())
    }

    fn next_geq(&mut self, target: DocId) -> Result<Option<Posting>> {
        loop {
            if self.no_more_postings {
                return Ok(None);
            }

            // Skip the runs that cannot contain the target
            let mut block_ix = self.block_ix;
            while self.blocks[block_ix].max_docid < target {
                if block_ix + 1 == self.blocks.len() {
                    self.finish();
                    return Ok(None);
                }
                block_ix += 1;
            }
            if block_ix != self.block_ix {
                debug!(
                    "[{}] Skipping from block {} to {} (target {})",
                    self.info.term, self.block_ix, block_ix, target
                );
                self.read_block(block_ix)?;
            }

            let start = self.position;
            self.position = start + self.docids[start..].partition_point(|&d| d < target);
            if self.position < self.docids.len() {
                return Ok(self.current());
            }

            // Only happens when the run maximum is unknown
            if self.block_ix + 1 < self.blocks.len() {
                self.read_block(self.block_ix + 1)?;
            } else {
                self.finish();
            }
        }
    }

    fn has_next(&self) -> bool {
        !self.no_more_postings
            && (self.position + 1 < self.docids.len() || self.block_ix + 1 < self.blocks.len())
    }

    fn length(&self) -> usize {
        self.info.posting_list_length as usize
    }
}

/// Posting iterator over an in-memory list
pub struct VecPostingIterator {
    postings: Vec<Posting>,
    position: usize,
}

impl VecPostingIterator {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self {
            postings,
            position: 0,
        }
    }
}

impl From<&[(DocId, TermFrequency)]> for VecPostingIterator {
    fn from(postings: &[(DocId, TermFrequency)]) -> Self {
        Self::new(
            postings
                .iter()
                .map(|&(docid, frequency)| Posting { docid, frequency })
                .collect(),
        )
    }
}

impl PostingIterator for VecPostingIterator {
    fn current(&self) -> Option<Posting> {
        self.postings.get(self.position).copied()
    }

    fn next(&mut self) -> Result<Option<Posting>> {
        if self.position < self.postings.len() {
            self.position += 1;
        }
        Ok(self.current())
    }

    fn next_geq(&mut self, target: DocId) -> Result<Option<Posting>> {
        if self.position < self.postings.len() {
            let start = self.position;
            self.position =
                start + self.postings[start..].partition_point(|p| p.docid < target);
        }
        Ok(self.current())
    }

    fn has_next(&self) -> bool {
        self.position + 1 < self.postings.len()
    }

    fn length(&self) -> usize {
        self.postings.len()
    }
}
