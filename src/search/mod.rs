pub mod daat;
pub mod maxscore;

use std::{cmp::Ordering, collections::BinaryHeap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{base::DocId, posting::PostingIterator};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredDocument {
    pub docid: DocId,
    pub score: f64,
}

impl std::fmt::Display for ScoredDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.docid, self.score)
    }
}

/// Heap entry: the worst document (lowest score, then latest inserted) is
/// the greatest
struct Candidate {
    document: ScoredDocument,
    order: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .document
            .score
            .total_cmp(&self.document.score)
            .then(self.order.cmp(&other.order))
    }
}

/// Keeps the `top_k` best scored documents
///
/// A candidate replaces the current worst document only if its score is
/// strictly greater, so that among equal scores the earliest wins.
pub struct TopScoredDocuments {
    heap: BinaryHeap<Candidate>,
    top_k: usize,
    inserted: u64,
}

impl TopScoredDocuments {
    pub fn new(top_k: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            top_k,
            inserted: 0,
        }
    }

    /// Add a new candidate, and returns the new lower bound on scores
    pub fn add(&mut self, candidate: DocId, score: f64) -> f64 {
        let entry = Candidate {
            document: ScoredDocument {
                docid: candidate,
                score,
            },
            order: self.inserted,
        };
        self.inserted += 1;

        if self.heap.len() < self.top_k {
            self.heap.push(entry);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if worst.document.score < score {
                *worst = entry;
            }
        }

        self.threshold()
    }

    /// Minimum score to enter the results (-infinity if not full)
    pub fn threshold(&self) -> f64 {
        match self.heap.peek() {
            Some(worst) if self.heap.len() >= self.top_k => worst.document.score,
            _ => f64::NEG_INFINITY,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Documents by decreasing score
    pub fn into_sorted_vec(self) -> Vec<ScoredDocument> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|candidate| candidate.document)
            .collect()
    }
}

/// How query terms are combined
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryMode {
    /// Documents containing at least one term
    Disjunctive,
    /// Documents containing every term
    Conjunctive,
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disjunctive" | "or" => Ok(QueryMode::Disjunctive),
            "conjunctive" | "and" => Ok(QueryMode::Conjunctive),
            _ => Err(format!(
                "unknown query mode {} (disjunctive or conjunctive)",
                s
            )),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryMode::Disjunctive => write!(f, "disjunctive"),
            QueryMode::Conjunctive => write!(f, "conjunctive"),
        }
    }
}

/// A query term with its posting list
pub struct QueryTerm<'a> {
    pub idf: f64,
    /// Maximum weight of the term (for the selected scoring function)
    pub upper_bound: f64,
    pub iterator: Box<dyn PostingIterator + 'a>,
}

impl<'a> QueryTerm<'a> {
    pub fn new(idf: f64, upper_bound: f64, iterator: Box<dyn PostingIterator + 'a>) -> Self {
        Self {
            idf,
            upper_bound,
            iterator,
        }
    }
}
