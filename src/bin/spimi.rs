use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use spimi_index::{
    builder::{BuilderOptions, Indexer},
    collection::CollectionReader,
    config::Config,
    document_index::{read_document_length, DOCUMENT_INDEX_FILE},
    lexicon::{find_term, LEXICON_FILE},
    merger::MergerOptions,
    parser::TsvParser,
    query::{QueryProcessor, SearchOptions, SearchOutcome},
    scoring::ScoringFunction,
    search::QueryMode,
};

#[derive(Parser)]
#[command(name = "spimi")]
#[command(about = "Build and query a blocked inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Indexes a collection of `name<TAB>text` lines
    Index {
        collection: PathBuf,
        /// Index directory
        index: PathBuf,
        /// Removes stopwords and stems the terms
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Writes the posting lists without compression
        #[arg(long, default_value_t = false)]
        no_compress: bool,
        /// Writes skip blocks for long posting lists
        #[arg(long, default_value_t = false)]
        skip_blocks: bool,
        /// Memory budget of a block, in MiB
        #[arg(long, default_value_t = 256)]
        memory_budget: usize,
        /// Writes the blocks on a separate thread
        #[arg(long, default_value_t = false)]
        background_flush: bool,
        #[arg(long, default_value_t = false)]
        progress: bool,
    },
    /// Searches the index
    Query {
        index: PathBuf,
        query: String,
        #[arg(long, default_value = "disjunctive")]
        mode: QueryMode,
        #[arg(long, default_value = "tfidf")]
        scoring: ScoringFunction,
        #[arg(short, default_value_t = 10)]
        k: usize,
        /// Uses MaxScore (disjunctive mode)
        #[arg(long, default_value_t = false)]
        max_score: bool,
        /// Reads the posting lists in memory instead of mapping them
        #[arg(long, default_value_t = false)]
        in_memory: bool,
        /// Outputs JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Reads the length of a document from the document index
    DocLength { index: PathBuf, docid: u64 },
    /// Looks up a term in the lexicon file
    Lookup { index: PathBuf, term: String },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            collection,
            index,
            stem,
            no_compress,
            skip_blocks,
            memory_budget,
            background_flush,
            progress,
        } => {
            let config = Config {
                stemming_and_stopwords: stem,
                compression: !no_compress,
                ..Config::default()
            };
            let options = BuilderOptions {
                memory_budget: memory_budget * 1024 * 1024,
                background_flush,
                progress,
            };
            let merger_options = MergerOptions {
                skip_blocks,
                progress,
                ..MergerOptions::default()
            };

            let parser = TsvParser::new(config.stemming_and_stopwords);
            let mut indexer = Indexer::new(&index, config, &options, &merger_options)?;
            indexer.index_collection(CollectionReader::open(&collection)?, &parser)?;
            let summary = indexer.build()?;
            info!(
                "{} documents, {} terms, {} skipped lines",
                summary.statistics.num_documents, summary.merge.num_terms, summary.skipped
            );
        }

        Commands::Query {
            index,
            query,
            mode,
            scoring,
            k,
            max_score,
            in_memory,
            json,
        } => {
            let processor = QueryProcessor::open(&index, in_memory)?;
            let options = SearchOptions {
                mode,
                scoring,
                top_k: k,
                max_score,
            };
            match processor.search(&query, &options)? {
                SearchOutcome::VagueQuery => println!("Your query is too vague"),
                SearchOutcome::Ranked(documents) => {
                    for document in documents {
                        if json {
                            match serde_json::to_string(&document) {
                                Ok(line) => println!("{}", line),
                                Err(e) => log::error!("Cannot serialize {:?}: {}", document, e),
                            }
                        } else {
                            println!("{}\t{}\t{:.4}", document.docid, document.name, document.score);
                        }
                    }
                }
            }
        }

        Commands::DocLength { index, docid } => {
            let length = read_document_length(&index.join(DOCUMENT_INDEX_FILE), docid)?;
            println!("{}", length);
        }

        Commands::Lookup { index, term } => match find_term(&index.join(LEXICON_FILE), &term)? {
            Some(info) => println!("{}", info),
            None => println!("{} is not in the lexicon", term),
        },
    }

    Ok(())
}
