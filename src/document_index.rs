//! Document index: maps document IDs to their external name and length
//!
//! Records are fixed-width (60 bytes) so that the length of a document
//! can be read directly from the file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};
use log::{debug, info};

use crate::base::{decode_text, encode_text, read_record, DocId, Len, TEXT_FIELD_LENGTH};
use crate::error::{Error, IoContext, Result};

pub const DOCUMENT_INDEX_FILE: &str = "documents.dat";

/// Size of a document record (doc ID, name, length)
pub const DOCUMENT_RECORD_LENGTH: usize = 8 + TEXT_FIELD_LENGTH + 4;

/// Offset of the length field within a record
const LENGTH_OFFSET: u64 = 8 + TEXT_FIELD_LENGTH as u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentInfo {
    pub name: String,
    pub length: u32,
}

/// Appends document records while indexing
pub struct DocumentIndexWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    count: u64,
    total_length: u64,
}

impl DocumentIndexWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::options()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)
            .context(|| format!("creating document index {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            count: 0,
            total_length: 0,
        })
    }

    /// Appends a document; document IDs must be dense and start at 0
    pub fn append(&mut self, docid: DocId, name: &str, length: u32) -> Result<()> {
        if docid != self.count {
            return Err(Error::Corrupted(format!(
                "document {} appended at position {}",
                docid, self.count
            )));
        }

        let mut record = [0u8; DOCUMENT_RECORD_LENGTH];
        BigEndian::write_u64(&mut record[0..8], docid);
        record[8..8 + TEXT_FIELD_LENGTH].copy_from_slice(&encode_text(name));
        BigEndian::write_u32(&mut record[8 + TEXT_FIELD_LENGTH..], length);
        self.writer
            .write_all(&record)
            .context(|| format!("writing to {}", self.path.display()))?;

        self.count += 1;
        self.total_length += length as u64;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .context(|| format!("flushing {}", self.path.display()))?;
        debug!("Wrote {} documents to {}", self.count, self.path.display());
        Ok(())
    }
}

/// In-memory document index
pub struct DocumentIndex {
    documents: HashMap<DocId, DocumentInfo>,
}

impl DocumentIndex {
    /// Loads all the records of the document index
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).context(|| format!("opening {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut documents = HashMap::new();
        let mut record = [0u8; DOCUMENT_RECORD_LENGTH];

        while read_record(&mut reader, &mut record)? {
            let docid = BigEndian::read_u64(&record[0..8]);
            let name = decode_text(&record[8..8 + TEXT_FIELD_LENGTH])?;
            let length = BigEndian::read_u32(&record[8 + TEXT_FIELD_LENGTH..]);
            documents.insert(docid, DocumentInfo { name, length });
        }

        info!("Loaded {} documents from {}", documents.len(), path.display());
        Ok(Self { documents })
    }

    pub fn get(&self, docid: DocId) -> Option<&DocumentInfo> {
        self.documents.get(&docid)
    }

    pub fn length(&self, docid: DocId) -> Option<u32> {
        self.documents.get(&docid).map(|d| d.length)
    }

    pub fn name(&self, docid: DocId) -> Option<&str> {
        self.documents.get(&docid).map(|d| d.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocId, &DocumentInfo)> {
        self.documents.iter()
    }
}

impl Len for DocumentIndex {
    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Reads all the document lengths, indexed by document ID
pub fn read_document_lengths(path: &Path) -> Result<Vec<u32>> {
    let file = File::open(path).context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut lengths = Vec::new();
    let mut record = [0u8; DOCUMENT_RECORD_LENGTH];

    while read_record(&mut reader, &mut record)? {
        let docid = BigEndian::read_u64(&record[0..8]);
        if docid != lengths.len() as u64 {
            return Err(Error::Corrupted(format!(
                "document {} found at position {}",
                docid,
                lengths.len()
            )));
        }
        lengths.push(BigEndian::read_u32(&record[8 + TEXT_FIELD_LENGTH..]));
    }
    Ok(lengths)
}

/// Reads the length of one document by seeking to its record
pub fn read_document_length(path: &Path, docid: DocId) -> Result<u32> {
    let mut file = File::open(path).context(|| format!("opening {}", path.display()))?;
    let size = file
        .metadata()
        .context(|| format!("reading metadata of {}", path.display()))?
        .len();
    let offset = docid
        .checked_mul(DOCUMENT_RECORD_LENGTH as u64)
        .and_then(|x| x.checked_add(LENGTH_OFFSET))
        .filter(|x| x + 4 <= size)
        .ok_or_else(|| Error::Corrupted(format!("document {} is not in the index", docid)))?;

    file.seek(SeekFrom::Start(offset))
        .context(|| format!("seeking in {}", path.display()))?;
    let mut buffer = [0u8; 4];
    file.read_exact(&mut buffer)
        .context(|| format!("reading {}", path.display()))?;
    Ok(BigEndian::read_u32(&buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_dir::TempDir;

    #[test]
    fn out_of_order_append_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut writer = DocumentIndexWriter::create(&dir.path().join("docs.dat")).unwrap();
        writer.append(0, "a", 3).unwrap();
        assert!(writer.append(2, "b", 3).is_err());
    }
}
