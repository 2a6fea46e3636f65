//! Disk-based inverted index: blocked (SPIMI) indexing, external merge of
//! the blocks, variable-byte compressed posting lists and
//! document-at-a-time retrieval with TFIDF or BM25

pub mod base;
pub mod builder;
pub mod collection;
pub mod compress;
pub mod config;
pub mod document_index;
pub mod error;
pub mod lexicon;
pub mod merger;
pub mod parser;
pub mod posting;
pub mod query;
pub mod scoring;
pub mod search;
pub mod statistics;
pub mod utils;

pub use error::{Error, Result};
