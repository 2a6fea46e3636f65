use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufWriter, Write},
    mem::size_of,
    path::{Path, PathBuf},
    thread::JoinHandle,
};

use derivative::Derivative;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::{
    base::{normalize_term, DocId, Len, TermFrequency},
    compress::Compression,
    config::Config,
    document_index::{DocumentIndexWriter, DOCUMENT_INDEX_FILE},
    error::{Error, IoContext, Result},
    lexicon::BlockLexiconEntry,
    merger::{MergeSummary, Merger, MergerOptions},
    parser::Parser,
    statistics::{Statistics, STATISTICS_FILE},
};

/// Sub-directory holding the partial blocks
pub const BLOCKS_FOLDER: &str = "blocks";

/// Rough per-entry cost of the term hash map
const HASH_ENTRY_OVERHEAD: usize = 16;

/*
* ---- First phase data structure
*
*/

#[derive(Derivative, Clone)]
#[derivative(Default)]
pub struct BuilderOptions {
    /// Estimated memory (in bytes) a block may use before being flushed
    #[derivative(Default(value = "256 * 1024 * 1024"))]
    pub memory_budget: usize,

    /// Writes blocks on a separate thread while the next one is built
    #[derivative(Default(value = "false"))]
    pub background_flush: bool,

    /// Displays a progress bar while indexing and merging
    #[derivative(Default(value = "false"))]
    pub progress: bool,
}

/// Paths of the three files of a partial block
pub struct BlockPaths {
    pub lexicon: PathBuf,
    pub docids: PathBuf,
    pub frequencies: PathBuf,
}

impl BlockPaths {
    pub fn new(folder: &Path, number: u64) -> Self {
        Self {
            lexicon: folder.join(format!("lexicon_{}.dat", number)),
            docids: folder.join(format!("docids_{}.dat", number)),
            frequencies: folder.join(format!("freqs_{}.dat", number)),
        }
    }

    pub fn all(&self) -> [&PathBuf; 3] {
        [&self.lexicon, &self.docids, &self.frequencies]
    }
}

/// Postings of a term within a block
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PostingList {
    pub docids: Vec<DocId>,
    pub frequencies: Vec<TermFrequency>,
}

impl PostingList {
    fn add(&mut self, docid: DocId) -> bool {
        match self.docids.last() {
            Some(&last) if last == docid => {
                if let Some(frequency) = self.frequencies.last_mut() {
                    *frequency += 1;
                }
                false
            }
            _ => {
                self.docids.push(docid);
                self.frequencies.push(1);
                true
            }
        }
    }
}

impl Len for PostingList {
    fn len(&self) -> usize {
        self.docids.len()
    }
}

/// Summary of a flushed block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub num_terms: usize,
    pub num_postings: usize,
    pub num_documents: usize,
}

/// In-memory term to postings structure for one block
#[derive(Default)]
pub struct PartialBlock {
    terms: HashMap<String, PostingList>,
    num_documents: usize,
    num_postings: usize,
    estimated_size: usize,
}

impl PartialBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the terms of a document (document IDs must be increasing) and
    /// returns the number of indexed occurrences
    pub fn insert<S: AsRef<str>>(&mut self, docid: DocId, terms: &[S]) -> usize {
        let mut indexed = 0;
        for term in terms {
            let term = normalize_term(term.as_ref());
            if term.is_empty() {
                continue;
            }
            indexed += 1;

            if let Some(postings) = self.terms.get_mut(term) {
                if postings.add(docid) {
                    self.num_postings += 1;
                    self.estimated_size += size_of::<DocId>() + size_of::<TermFrequency>();
                }
            } else {
                let mut postings = PostingList::default();
                postings.add(docid);
                self.num_postings += 1;
                self.estimated_size += term.len()
                    + size_of::<String>()
                    + size_of::<PostingList>()
                    + HASH_ENTRY_OVERHEAD
                    + size_of::<DocId>()
                    + size_of::<TermFrequency>();
                self.terms.insert(term.to_string(), postings);
            }
        }
        self.num_documents += 1;
        indexed
    }

    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    /// Estimated heap usage of the block
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn num_documents(&self) -> usize {
        self.num_documents
    }

    pub fn is_empty(&self) -> bool {
        self.num_documents == 0
    }

    /// Writes the block (sorted lexicon, document IDs and frequencies)
    pub fn write(self, folder: &Path, number: u64) -> Result<BlockSummary> {
        let paths = BlockPaths::new(folder, number);
        let create = |path: &PathBuf| -> Result<BufWriter<File>> {
            File::options()
                .write(true)
                .truncate(true)
                .create(true)
                .open(path)
                .map(BufWriter::new)
                .context(|| format!("creating block file {}", path.display()))
        };
        let mut lexicon_writer = create(&paths.lexicon)?;
        let mut docids_writer = create(&paths.docids)?;
        let mut frequencies_writer = create(&paths.frequencies)?;

        let num_documents = self.num_documents;
        let num_postings = self.num_postings;
        let mut terms: Vec<(String, PostingList)> = self.terms.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let num_terms = terms.len();

        let mut offset_docids = 0u64;
        let mut offset_freqs = 0u64;
        let context = || format!("writing block {}", number);
        for (term, postings) in terms {
            let entry = BlockLexiconEntry {
                term,
                offset_docids,
                offset_freqs,
                posting_list_length: postings.len() as u32,
            };
            entry.write_to(&mut lexicon_writer).context(context)?;
            offset_docids += Compression::Identity
                .write(&mut docids_writer, &postings.docids)
                .context(context)? as u64;
            offset_freqs += Compression::Identity
                .write(&mut frequencies_writer, &postings.frequencies)
                .context(context)? as u64;
        }

        lexicon_writer.flush().context(context)?;
        docids_writer.flush().context(context)?;
        frequencies_writer.flush().context(context)?;

        info!(
            "Flushed block {} ({} documents, {} terms, {} postings)",
            number, num_documents, num_terms, num_postings
        );
        Ok(BlockSummary {
            number,
            num_terms,
            num_postings,
            num_documents,
        })
    }
}

/// Builds partial blocks, flushing them when the memory budget is exceeded
pub struct BlockBuilder {
    options: BuilderOptions,
    folder: PathBuf,
    block: PartialBlock,
    next_block: u64,
    last_docid: Option<DocId>,
    /// Block being written in the background
    pending: Option<JoinHandle<Result<BlockSummary>>>,
    flushed: Vec<BlockSummary>,
}

impl BlockBuilder {
    pub fn new(folder: &Path, options: &BuilderOptions) -> Result<Self> {
        fs::create_dir_all(folder).context(|| format!("creating {}", folder.display()))?;
        Ok(Self {
            options: options.clone(),
            folder: folder.to_path_buf(),
            block: PartialBlock::new(),
            next_block: 0,
            last_docid: None,
            pending: None,
            flushed: Vec::new(),
        })
    }

    /// Adds a document to the current block, and returns its length
    pub fn insert<S: AsRef<str>>(&mut self, docid: DocId, terms: &[S]) -> Result<usize> {
        if let Some(last) = self.last_docid {
            if docid <= last {
                return Err(Error::Corrupted(format!(
                    "Doc ID should be increasing and this is not the case: {} vs {}",
                    last, docid
                )));
            }
        }
        self.last_docid = Some(docid);
        let length = self.block.insert(docid, terms);

        if self.block.estimated_size() > self.options.memory_budget {
            debug!(
                "Block {} uses {} bytes (budget {})",
                self.next_block,
                self.block.estimated_size(),
                self.options.memory_budget
            );
            self.flush()?;
        }
        Ok(length)
    }

    /// Flushes the current block (if not empty)
    pub fn flush(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }

        // Starts with a fresh block, the snapshot is owned by the writer
        let snapshot = std::mem::take(&mut self.block);
        let number = self.next_block;
        self.next_block += 1;

        if self.options.background_flush {
            self.wait_pending()?;
            let folder = self.folder.clone();
            self.pending = Some(std::thread::spawn(move || snapshot.write(&folder, number)));
        } else {
            let summary = snapshot.write(&self.folder, number)?;
            self.flushed.push(summary);
        }
        Ok(())
    }

    fn wait_pending(&mut self) -> Result<()> {
        if let Some(handle) = self.pending.take() {
            let summary = handle.join().map_err(|_| {
                Error::io(
                    "flushing a block",
                    std::io::Error::new(std::io::ErrorKind::Other, "flush thread panicked"),
                )
            })??;
            self.flushed.push(summary);
        }
        Ok(())
    }

    /// Number of blocks flushed or being flushed
    pub fn num_blocks(&self) -> u64 {
        self.next_block
    }

    pub fn current_block(&self) -> &PartialBlock {
        &self.block
    }

    /// Flushes the last block and returns the summaries of all blocks
    pub fn finish(mut self) -> Result<Vec<BlockSummary>> {
        self.flush()?;
        self.wait_pending()?;
        Ok(self.flushed)
    }
}

/// Summary of a full indexing run
#[derive(Clone, Debug)]
pub struct IndexSummary {
    pub statistics: Statistics,
    pub blocks: Vec<BlockSummary>,
    pub merge: MergeSummary,
    /// Lines rejected by the parser
    pub skipped: u64,
}

/// The indexer consumes documents and builds the index in a folder
pub struct Indexer {
    folder: PathBuf,
    config: Config,
    options: BuilderOptions,
    merger_options: MergerOptions,
    blocks: BlockBuilder,
    documents: DocumentIndexWriter,
    progress: ProgressBar,
    skipped: u64,
}

impl Indexer {
    pub fn new(
        folder: &Path,
        config: Config,
        options: &BuilderOptions,
        merger_options: &MergerOptions,
    ) -> Result<Indexer> {
        fs::create_dir_all(folder).context(|| format!("creating {}", folder.display()))?;
        let progress = if options.progress {
            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} documents {msg}"),
            );
            progress
        } else {
            ProgressBar::hidden()
        };

        Ok(Indexer {
            folder: folder.to_path_buf(),
            config,
            options: options.clone(),
            merger_options: merger_options.clone(),
            blocks: BlockBuilder::new(&folder.join(BLOCKS_FOLDER), options)?,
            documents: DocumentIndexWriter::create(&folder.join(DOCUMENT_INDEX_FILE))?,
            progress,
            skipped: 0,
        })
    }

    /// Adds a document and returns its ID
    pub fn add<S: AsRef<str>>(&mut self, name: &str, terms: &[S]) -> Result<DocId> {
        let docid = self.documents.count();
        let length = self.blocks.insert(docid, terms)?;
        self.documents.append(docid, name, length as u32)?;
        self.progress.inc(1);
        Ok(docid)
    }

    /// Parses and adds all the lines of a collection, skipping the lines
    /// rejected by the parser
    pub fn index_collection<I, P>(&mut self, lines: I, parser: &P) -> Result<u64>
    where
        I: IntoIterator<Item = Result<String>>,
        P: Parser + ?Sized,
    {
        let mut added = 0;
        for line in lines {
            let line = line?;
            match parser.parse(&line) {
                Some(document) => {
                    self.add(&document.name, &document.terms)?;
                    added += 1;
                }
                None => {
                    debug!("Skipping malformed line {:?}", line);
                    self.skipped += 1;
                }
            }
        }
        Ok(added)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // Closes the index structures, merges the blocks and writes the
    // configuration (last, since it marks the index as built)
    pub fn build(self) -> Result<IndexSummary> {
        let total_length = self.documents.total_length();
        let num_documents = self.documents.count();
        self.documents.finish()?;
        let blocks = self.blocks.finish()?;
        self.progress.finish_with_message("indexed");

        if blocks.is_empty() {
            warn!("No document was indexed in {}", self.folder.display());
        }

        let statistics = Statistics::new(blocks.len() as u64, num_documents, total_length);
        statistics.save(&self.folder.join(STATISTICS_FILE))?;
        info!(
            "Indexed {} documents in {} blocks (average length {})",
            statistics.num_documents, statistics.num_blocks, statistics.average_document_length
        );

        let mut merger_options = self.merger_options.clone();
        merger_options.progress = merger_options.progress || self.options.progress;
        let merge = Merger::new(&self.folder, &self.config, &merger_options)?.merge()?;

        self.config.save(&self.folder)?;
        Ok(IndexSummary {
            statistics,
            blocks,
            merge,
            skipped: self.skipped,
        })
    }
}
