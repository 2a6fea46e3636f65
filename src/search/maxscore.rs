//! MaxScore algorithm

use derivative::Derivative;
use log::debug;

use crate::{
    base::{DocId, Posting},
    error::Result,
    scoring::Scorer,
    search::{QueryTerm, ScoredDocument, TopScoredDocuments},
};

struct MaxScoreTermIterator<'t, 'a> {
    term: &'t mut QueryTerm<'a>,
    /// Position of the term in the query
    term_index: usize,
    posting: Posting,
}

impl MaxScoreTermIterator<'_, '_> {
    /// Call iterator's next
    fn next(&mut self) -> Result<bool> {
        Ok(match self.term.iterator.next()? {
            Some(posting) => {
                self.posting = posting;
                true
            }
            None => false,
        })
    }

    fn seek_geq(&mut self, docid: DocId) -> Result<Option<Posting>> {
        debug!(
            "[term {}] Searching for doc id >= {}",
            self.term_index, docid
        );
        if docid <= self.posting.docid {
            return Ok(Some(self.posting));
        }

        Ok(self.term.iterator.next_geq(docid)?.map(|posting| {
            self.posting = posting;
            posting
        }))
    }

    fn max_value(&self) -> f64 {
        self.term.upper_bound
    }
}

#[derive(Derivative, Clone, Copy)]
#[derivative(Default)]
pub struct MaxScoreOptions {
    /// Longest lists become passive first (otherwise lowest upper bounds)
    #[derivative(Default(value = "true"))]
    pub length_based_ordering: bool,
}

/*
 * Disjunctive search using the MaxScore algorithm: terms whose cumulated
 * upper bounds cannot reach the current threshold become passive, and are
 * only used to score documents found by the active ones
 */
pub fn search_maxscore(
    terms: &mut [QueryTerm],
    scorer: &Scorer,
    top_k: usize,
    options: MaxScoreOptions,
) -> Result<Vec<ScoredDocument>> {
    // --- Initialize the structures

    let mut results = TopScoredDocuments::new(top_k);
    let mut active = Vec::new();
    let mut theta: f64;
    let num_terms = terms.len();

    for (term_index, term) in terms.iter_mut().enumerate() {
        if let Some(posting) = term.iterator.current() {
            active.push(MaxScoreTermIterator {
                term,
                term_index,
                posting,
            });
        }
    }

    if options.length_based_ordering {
        // Sort by posting list length (increasing, so that the longest will be passive first)
        active.sort_by(|a, b| a.term.iterator.length().cmp(&b.term.iterator.length()));
    } else {
        // Sort by max values (decreasing)
        active.sort_by(|a, b| b.max_value().total_cmp(&a.max_value()));
    }

    let mut passive = Vec::<MaxScoreTermIterator>::new();
    let mut sum_pass = 0.;

    // Weights are summed in query order, as in exhaustive evaluation
    let mut weights = vec![0f64; num_terms];

    while !active.is_empty() {
        // select next document, match all cursors
        let candidate: DocId = active
            .iter()
            .fold(DocId::MAX, |cur, t| cur.min(t.posting.docid));

        weights.iter_mut().for_each(|w| *w = 0.);

        // score document
        let mut kept = Vec::with_capacity(passive.len());
        for mut t in passive.drain(..) {
            if let Some(posting) = t.seek_geq(candidate)? {
                if candidate == posting.docid {
                    weights[t.term_index] = scorer.term_weight(t.term.idf, posting);
                }
                kept.push(t);
            }
        }
        passive = kept;

        let mut kept = Vec::with_capacity(active.len());
        for mut t in active.drain(..) {
            if t.posting.docid == candidate {
                weights[t.term_index] = scorer.term_weight(t.term.idf, t.posting);
                if !t.next()? {
                    continue;
                }
            }
            kept.push(t);
        }
        active = kept;

        let score: f64 = weights.iter().sum();

        // check against heap, update if needed
        theta = results.add(candidate, score).max(0.);

        // try to expand passive set
        if let Some(t) = active.last() {
            if t.max_value() + sum_pass < theta {
                sum_pass += t.max_value();
                if let Some(t) = active.pop() {
                    debug!(
                        "[term {}] Becomes passive (threshold {})",
                        t.term_index, theta
                    );
                    passive.push(t);
                }
            }
        }
    }

    Ok(results.into_sorted_vec())
}
