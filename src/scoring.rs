//! Term weighting (TFIDF and BM25)
//!
//! The same parameters are used by the merger, to compute the per-term
//! upper bounds, and at query time.

use std::fmt;
use std::str::FromStr;

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::base::{DocId, Posting};
use crate::document_index::DocumentIndex;
use crate::lexicon::TermInfo;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringFunction {
    Tfidf,
    Bm25,
}

impl FromStr for ScoringFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tfidf" => Ok(ScoringFunction::Tfidf),
            "bm25" => Ok(ScoringFunction::Bm25),
            _ => Err(format!("unknown scoring function {} (tfidf or bm25)", s)),
        }
    }
}

impl fmt::Display for ScoringFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringFunction::Tfidf => write!(f, "tfidf"),
            ScoringFunction::Bm25 => write!(f, "bm25"),
        }
    }
}

#[derive(Derivative, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[derivative(Default)]
pub struct ScoringParameters {
    /// BM25 term frequency saturation
    #[derivative(Default(value = "1.2"))]
    pub k1: f64,

    /// BM25 length normalization
    #[derivative(Default(value = "0.75"))]
    pub b: f64,
}

impl ScoringParameters {
    /// Inverse document frequency, `log10(N / df)`
    pub fn idf(num_documents: u64, document_frequency: usize) -> f64 {
        if document_frequency == 0 || num_documents == 0 {
            return 0.;
        }
        (num_documents as f64 / document_frequency as f64).log10()
    }

    pub fn tfidf(&self, frequency: u32, idf: f64) -> f64 {
        if frequency == 0 {
            return 0.;
        }
        (1. + (frequency as f64).log10()) * idf
    }

    pub fn bm25(
        &self,
        frequency: u32,
        idf: f64,
        document_length: u32,
        average_document_length: f64,
    ) -> f64 {
        let tf = frequency as f64;
        let average = if average_document_length > 0. {
            average_document_length
        } else {
            1.
        };
        let normalization = 1. - self.b + self.b * (document_length as f64) / average;
        idf * tf * (self.k1 + 1.) / (tf + self.k1 * normalization)
    }

    pub fn weight(
        &self,
        function: ScoringFunction,
        frequency: u32,
        idf: f64,
        document_length: u32,
        average_document_length: f64,
    ) -> f64 {
        match function {
            ScoringFunction::Tfidf => self.tfidf(frequency, idf),
            ScoringFunction::Bm25 => {
                self.bm25(frequency, idf, document_length, average_document_length)
            }
        }
    }
}

/// Gives access to document lengths (for BM25)
pub trait DocumentLengths: Sync {
    fn document_length(&self, docid: DocId) -> u32;
}

impl DocumentLengths for DocumentIndex {
    fn document_length(&self, docid: DocId) -> u32 {
        self.length(docid).unwrap_or(0)
    }
}

impl DocumentLengths for [u32] {
    fn document_length(&self, docid: DocId) -> u32 {
        self.get(docid as usize).copied().unwrap_or(0)
    }
}

impl DocumentLengths for Vec<u32> {
    fn document_length(&self, docid: DocId) -> u32 {
        self.as_slice().document_length(docid)
    }
}

/// Computes term weights for one query
pub struct Scorer<'a> {
    pub function: ScoringFunction,
    pub parameters: ScoringParameters,
    pub average_document_length: f64,
    pub lengths: &'a dyn DocumentLengths,
}

impl<'a> Scorer<'a> {
    pub fn term_weight(&self, idf: f64, posting: Posting) -> f64 {
        let length = match self.function {
            ScoringFunction::Tfidf => 0,
            ScoringFunction::Bm25 => self.lengths.document_length(posting.docid),
        };
        self.parameters.weight(
            self.function,
            posting.frequency,
            idf,
            length,
            self.average_document_length,
        )
    }

    /// The upper bound stored in the lexicon for the scoring function
    pub fn upper_bound(&self, info: &TermInfo) -> f64 {
        match self.function {
            ScoringFunction::Tfidf => info.tfidf_upper_bound as f64,
            ScoringFunction::Bm25 => info.bm25_upper_bound as f64,
        }
    }
}

/// Converts a (non negative) bound to f32, never below the f64 value
pub fn round_up_f32(value: f64) -> f32 {
    let rounded = value as f32;
    if (rounded as f64) < value {
        f32::from_bits(rounded.to_bits() + 1)
    } else {
        rounded
    }
}
