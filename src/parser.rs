//! Document parsing: turns a raw collection line into a document name and
//! its sequence of normalized terms

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

use crate::base::truncate_text;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// A parsed document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedDocument {
    pub name: String,
    pub terms: Vec<String>,
}

pub trait Parser: Send + Sync {
    /// Parses a raw document; returns `None` if the input is malformed or
    /// contains no term
    fn parse(&self, raw: &str) -> Option<ParsedDocument>;

    /// Normalizes free text (used for queries)
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lowercases, splits on non alphanumeric characters and optionally
/// removes stopwords and stems
#[derive(Clone, Copy, Debug)]
pub struct Normalizer {
    pub stemming_and_stopwords: bool,
}

impl Normalizer {
    pub fn new(stemming_and_stopwords: bool) -> Self {
        Self {
            stemming_and_stopwords,
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowercased = text.to_lowercase();
        TOKEN
            .find_iter(&lowercased)
            .map(|m| m.as_str())
            .filter(|token| !(self.stemming_and_stopwords && STOPWORDS.contains(token)))
            .map(|token| {
                if self.stemming_and_stopwords {
                    STEMMER.stem(token).into_owned()
                } else {
                    token.to_string()
                }
            })
            .collect()
    }
}

/// Parses `name<TAB>text` lines
pub struct TsvParser {
    normalizer: Normalizer,
}

impl TsvParser {
    pub fn new(stemming_and_stopwords: bool) -> Self {
        Self {
            normalizer: Normalizer::new(stemming_and_stopwords),
        }
    }
}

impl Parser for TsvParser {
    fn parse(&self, raw: &str) -> Option<ParsedDocument> {
        let (name, text) = raw.split_once('\t')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let terms = self.normalizer.tokenize(text);
        if terms.is_empty() {
            return None;
        }

        Some(ParsedDocument {
            name: truncate_text(name).to_string(),
            terms,
        })
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        self.normalizer.tokenize(text)
    }
}
