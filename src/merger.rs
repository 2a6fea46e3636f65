//! External k-way merge of the partial blocks into the global index

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use byteorder::{BigEndian, ByteOrder};
use derivative::Derivative;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::{
    base::{DocId, TermFrequency},
    builder::{BlockPaths, BLOCKS_FOLDER},
    compress::{Compression, CodecValue},
    config::Config,
    document_index::{read_document_lengths, DOCUMENT_INDEX_FILE},
    error::{Error, IoContext, Result},
    lexicon::{BlockLexiconEntry, SkipBlock, TermInfo, LEXICON_FILE},
    posting::{DOCIDS_FILE, FREQUENCIES_FILE, SKIPS_FILE},
    scoring::{round_up_f32, ScoringParameters},
    statistics::{Statistics, STATISTICS_FILE},
};

const DEFAULT_PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} terms {msg}";

#[derive(Derivative, Clone)]
#[derivative(Default)]
pub struct MergerOptions {
    /// Writes skip blocks for long posting lists
    #[derivative(Default(value = "true"))]
    pub skip_blocks: bool,

    /// Posting lists with more postings than this get skip blocks
    #[derivative(Default(value = "1024"))]
    pub skip_threshold: usize,

    /// Removes the partial block files once merged
    #[derivative(Default(value = "true"))]
    pub delete_blocks: bool,

    #[derivative(Default(value = "false"))]
    pub progress: bool,
}

/// Summary of a merge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub num_terms: u64,
    pub num_postings: u64,
    pub num_skipblocks: u64,
}

/// Reads the lexicon and posting streams of one partial block, in order
struct BlockCursor {
    number: u64,
    paths: BlockPaths,
    lexicon: BufReader<File>,
    docids: BufReader<File>,
    frequencies: BufReader<File>,

    /// Positions in the posting streams
    docids_position: u64,
    freqs_position: u64,

    /// Current lexicon entry (`None` once the block is exhausted)
    current: Option<BlockLexiconEntry>,
}

impl BlockCursor {
    fn open(folder: &Path, number: u64) -> Result<Self> {
        let paths = BlockPaths::new(folder, number);
        let open = |path: &PathBuf| {
            File::open(path)
                .map(BufReader::new)
                .context(|| format!("opening block file {}", path.display()))
        };

        let mut cursor = Self {
            number,
            lexicon: open(&paths.lexicon)?,
            docids: open(&paths.docids)?,
            frequencies: open(&paths.frequencies)?,
            paths,
            docids_position: 0,
            freqs_position: 0,
            current: None,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = BlockLexiconEntry::read_from(&mut self.lexicon)?;
        if self.current.is_none() {
            debug!("Block {} is exhausted", self.number);
        }
        Ok(())
    }

    fn term(&self) -> Option<&str> {
        self.current.as_ref().map(|entry| entry.term.as_str())
    }

    /// Appends the postings of the current term
    fn read_postings(
        &mut self,
        docids: &mut Vec<DocId>,
        frequencies: &mut Vec<TermFrequency>,
    ) -> Result<()> {
        let entry = match &self.current {
            Some(entry) => entry,
            None => return Ok(()),
        };

        // Block streams are written in lexicon order
        if entry.offset_docids != self.docids_position || entry.offset_freqs != self.freqs_position
        {
            return Err(Error::Corrupted(format!(
                "block {}: term {} is at ({}, {}) instead of ({}, {})",
                self.number,
                entry.term,
                entry.offset_docids,
                entry.offset_freqs,
                self.docids_position,
                self.freqs_position
            )));
        }

        let length = entry.posting_list_length as usize;
        read_raw(&mut self.docids, length, docids, &self.paths.docids)?;
        read_raw(&mut self.frequencies, length, frequencies, &self.paths.frequencies)?;
        self.docids_position += (length * DocId::WIDTH) as u64;
        self.freqs_position += (length * TermFrequency::WIDTH) as u64;
        Ok(())
    }

    fn remove_files(&self) {
        for path in self.paths.all() {
            if let Err(e) = fs::remove_file(path) {
                warn!("Could not delete block file {}: {}", path.display(), e);
            }
        }
    }
}

/// Reads `count` raw big-endian values
fn read_raw<T: CodecValue, R: Read>(
    reader: &mut R,
    count: usize,
    values: &mut Vec<T>,
    path: &Path,
) -> Result<()> {
    let mut data = vec![0u8; count * T::WIDTH];
    reader.read_exact(&mut data).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Corrupted(format!("block file {} is truncated", path.display()))
        } else {
            Error::io(format!("reading {}", path.display()), e)
        }
    })?;
    values.extend(data.chunks_exact(T::WIDTH).map(T::read_raw));
    Ok(())
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::Corrupted(format!("{} does not fit in 32 bits: {}", what, value)))
}

/// Writes the global index streams, keeping track of the offsets
struct IndexWriter {
    compression: Compression,
    lexicon: BufWriter<File>,
    docids: BufWriter<File>,
    frequencies: BufWriter<File>,
    skips: BufWriter<File>,
    docids_position: u64,
    freqs_position: u64,
    skips_position: u64,
}

impl IndexWriter {
    fn create(folder: &Path, compression: Compression) -> Result<Self> {
        let create = |name: &str| {
            let path = folder.join(name);
            File::options()
                .write(true)
                .truncate(true)
                .create(true)
                .open(&path)
                .map(BufWriter::new)
                .context(|| format!("creating {}", path.display()))
        };
        Ok(Self {
            compression,
            lexicon: create(LEXICON_FILE)?,
            docids: create(DOCIDS_FILE)?,
            frequencies: create(FREQUENCIES_FILE)?,
            skips: create(SKIPS_FILE)?,
            docids_position: 0,
            freqs_position: 0,
            skips_position: 0,
        })
    }

    /// Writes a run of postings and returns its skip block
    fn write_run(&mut self, docids: &[DocId], frequencies: &[TermFrequency]) -> Result<SkipBlock> {
        let docid_bytes = self
            .compression
            .write(&mut self.docids, docids)
            .context(|| format!("writing {}", DOCIDS_FILE))?;
        let freq_bytes = self
            .compression
            .write(&mut self.frequencies, frequencies)
            .context(|| format!("writing {}", FREQUENCIES_FILE))?;

        let block = SkipBlock {
            start_docid_offset: self.docids_position,
            docid_byte_length: to_u32(docid_bytes, "run byte length")?,
            start_freq_offset: self.freqs_position,
            freq_byte_length: to_u32(freq_bytes, "run byte length")?,
            max_docid: docids.last().copied().unwrap_or_default(),
        };
        self.docids_position += docid_bytes as u64;
        self.freqs_position += freq_bytes as u64;
        Ok(block)
    }

    fn write_skip(&mut self, block: &SkipBlock) -> Result<()> {
        block
            .write_to(&mut self.skips)
            .context(|| format!("writing {}", SKIPS_FILE))?;
        self.skips_position += SkipBlock::RECORD_LENGTH as u64;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        for (name, writer) in [
            (LEXICON_FILE, &mut self.lexicon),
            (DOCIDS_FILE, &mut self.docids),
            (FREQUENCIES_FILE, &mut self.frequencies),
            (SKIPS_FILE, &mut self.skips),
        ] {
            writer.flush().context(|| format!("writing {}", name))?;
        }
        Ok(())
    }
}

/// Size of the runs for a posting list of the given length
pub fn skip_run_length(length: usize) -> usize {
    let mut run = (length as f64).sqrt().ceil() as usize;
    // Guards against floating point errors
    while run * run < length {
        run += 1;
    }
    while run > 1 && (run - 1) * (run - 1) >= length {
        run -= 1;
    }
    run.max(1)
}

/// Merges the partial blocks of an index folder
pub struct Merger {
    folder: PathBuf,
    compression: Compression,
    scoring: ScoringParameters,
    options: MergerOptions,
    statistics: Statistics,
    document_lengths: Vec<u32>,
}

impl Merger {
    /// Prepares the merge: the statistics and the document index must
    /// have been written
    pub fn new(folder: &Path, config: &Config, options: &MergerOptions) -> Result<Self> {
        let statistics = Statistics::load(&folder.join(STATISTICS_FILE))?;
        let document_lengths = read_document_lengths(&folder.join(DOCUMENT_INDEX_FILE))?;
        if document_lengths.len() as u64 != statistics.num_documents {
            return Err(Error::Corrupted(format!(
                "{} documents in the document index, {} in the statistics",
                document_lengths.len(),
                statistics.num_documents
            )));
        }

        Ok(Self {
            folder: folder.to_path_buf(),
            compression: config.compression_scheme(),
            scoring: config.scoring,
            options: options.clone(),
            statistics,
            document_lengths,
        })
    }

    pub fn merge(&self) -> Result<MergeSummary> {
        let blocks_folder = self.folder.join(BLOCKS_FOLDER);
        let mut cursors = (0..self.statistics.num_blocks)
            .map(|number| BlockCursor::open(&blocks_folder, number))
            .collect::<Result<Vec<_>>>()?;

        let progress = if self.options.progress {
            let entries = cursors
                .iter()
                .map(|cursor| {
                    fs::metadata(&cursor.paths.lexicon)
                        .map(|m| m.len() / BlockLexiconEntry::RECORD_LENGTH as u64)
                        .unwrap_or(0)
                })
                .sum();
            let progress = ProgressBar::new(entries);
            progress.set_style(
                ProgressStyle::default_bar()
                    .template(DEFAULT_PROGRESS_TEMPLATE)
                    .progress_chars("=> "),
            );
            progress
        } else {
            ProgressBar::hidden()
        };

        info!(
            "Merging {} blocks ({:?}, skip blocks: {})",
            cursors.len(),
            self.compression,
            self.options.skip_blocks
        );

        let mut writer = IndexWriter::create(&self.folder, self.compression)?;
        let mut summary = MergeSummary::default();
        let mut docids = Vec::new();
        let mut frequencies = Vec::new();

        loop {
            // Smallest current term
            let term = match cursors.iter().filter_map(|c| c.term()).min() {
                Some(term) => term.to_string(),
                None => break,
            };

            // Concatenates the posting lists of the blocks (in block order)
            docids.clear();
            frequencies.clear();
            for cursor in cursors.iter_mut() {
                if cursor.term() == Some(term.as_str()) {
                    cursor.read_postings(&mut docids, &mut frequencies)?;
                    cursor.advance()?;
                    progress.inc(1);
                }
            }

            if let Some(position) = docids.windows(2).position(|w| w[0] >= w[1]) {
                return Err(Error::Corrupted(format!(
                    "term {}: document IDs are not increasing ({} then {})",
                    term,
                    docids[position],
                    docids[position + 1]
                )));
            }

            let info = self.write_term(&mut writer, term, &docids, &frequencies)?;
            debug!("Merged {}", info);
            summary.num_terms += 1;
            summary.num_postings += docids.len() as u64;
            summary.num_skipblocks += info.num_skipblocks as u64;
        }

        writer.finish()?;
        progress.finish();
        info!(
            "Merged {} terms ({} postings, {} skip blocks)",
            summary.num_terms, summary.num_postings, summary.num_skipblocks
        );

        if self.options.delete_blocks {
            for cursor in cursors.iter() {
                cursor.remove_files();
            }
            if let Err(e) = fs::remove_dir(&blocks_folder) {
                warn!("Could not delete {}: {}", blocks_folder.display(), e);
            }
        }

        Ok(summary)
    }

    /// Writes the posting list of a term and its lexicon entry
    fn write_term(
        &self,
        writer: &mut IndexWriter,
        term: String,
        docids: &[DocId],
        frequencies: &[TermFrequency],
    ) -> Result<TermInfo> {
        let length = docids.len();
        let offset_docids = writer.docids_position;
        let offset_freqs = writer.freqs_position;
        let offset_skipblocks = writer.skips_position;
        let mut num_skipblocks = 0;

        if self.options.skip_blocks && length > self.options.skip_threshold {
            let run = skip_run_length(length);
            for (docids, frequencies) in docids.chunks(run).zip(frequencies.chunks(run)) {
                let block = writer.write_run(docids, frequencies)?;
                writer.write_skip(&block)?;
                num_skipblocks += 1;
            }
        } else {
            writer.write_run(docids, frequencies)?;
        }

        let idf = ScoringParameters::idf(self.statistics.num_documents, length);
        let (tfidf_bound, bm25_bound) = self.upper_bounds(idf, docids, frequencies);

        let info = TermInfo {
            term,
            offset_docids,
            offset_freqs,
            docids_byte_length: to_u32(
                (writer.docids_position - offset_docids) as usize,
                "document ID list byte length",
            )?,
            freqs_byte_length: to_u32(
                (writer.freqs_position - offset_freqs) as usize,
                "frequency list byte length",
            )?,
            posting_list_length: to_u32(length, "posting list length")?,
            idf,
            offset_skipblocks: if num_skipblocks > 0 {
                offset_skipblocks
            } else {
                0
            },
            num_skipblocks,
            tfidf_upper_bound: round_up_f32(tfidf_bound),
            bm25_upper_bound: round_up_f32(bm25_bound),
        };
        info.write_to(&mut writer.lexicon)
            .context(|| format!("writing {}", LEXICON_FILE))?;
        Ok(info)
    }

    /// Maximum TFIDF and BM25 weights over the posting list
    fn upper_bounds(&self, idf: f64, docids: &[DocId], frequencies: &[TermFrequency]) -> (f64, f64) {
        let average = self.statistics.average_document_length as f64;
        docids
            .iter()
            .zip(frequencies)
            .fold((0f64, 0f64), |(tfidf, bm25), (&docid, &frequency)| {
                let length = self
                    .document_lengths
                    .get(docid as usize)
                    .copied()
                    .unwrap_or(0);
                (
                    tfidf.max(self.scoring.tfidf(frequency, idf)),
                    bm25.max(self.scoring.bm25(frequency, idf, length, average)),
                )
            })
    }
}

/// Reads back the raw posting list of a block term (used for checks)
pub fn read_block_postings(
    folder: &Path,
    number: u64,
    entry: &BlockLexiconEntry,
) -> Result<Vec<(DocId, TermFrequency)>> {
    let paths = BlockPaths::new(&folder.join(BLOCKS_FOLDER), number);
    let read = |path: &PathBuf, offset: u64, width: usize| -> Result<Vec<u8>> {
        let data = fs::read(path).context(|| format!("reading {}", path.display()))?;
        let start = offset as usize;
        let end = start + entry.posting_list_length as usize * width;
        data.get(start..end)
            .map(|slice| slice.to_vec())
            .ok_or_else(|| Error::Corrupted(format!("{} is truncated", path.display())))
    };

    let docids = read(&paths.docids, entry.offset_docids, DocId::WIDTH)?;
    let frequencies = read(&paths.frequencies, entry.offset_freqs, TermFrequency::WIDTH)?;
    Ok(docids
        .chunks_exact(DocId::WIDTH)
        .zip(frequencies.chunks_exact(TermFrequency::WIDTH))
        .map(|(d, f)| (BigEndian::read_u64(d), BigEndian::read_u32(f)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_lengths() {
        assert_eq!(skip_run_length(1), 1);
        assert_eq!(skip_run_length(4), 2);
        assert_eq!(skip_run_length(5), 3);
        assert_eq!(skip_run_length(1025), 33);
        assert_eq!(skip_run_length(1024), 32);
    }
}
