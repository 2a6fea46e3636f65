//! Document-at-a-time evaluation

use log::debug;

use crate::{
    base::DocId,
    error::Result,
    scoring::Scorer,
    search::{QueryMode, QueryTerm, ScoredDocument, TopScoredDocuments},
};

pub fn search_daat(
    terms: &mut [QueryTerm],
    scorer: &Scorer,
    mode: QueryMode,
    top_k: usize,
) -> Result<Vec<ScoredDocument>> {
    let mut results = TopScoredDocuments::new(top_k);
    match mode {
        QueryMode::Disjunctive => disjunctive(terms, scorer, &mut results)?,
        QueryMode::Conjunctive => conjunctive(terms, scorer, &mut results)?,
    }
    Ok(results.into_sorted_vec())
}

/// Smallest current document ID over the non exhausted lists
fn min_docid(terms: &[QueryTerm]) -> Option<DocId> {
    terms
        .iter()
        .filter_map(|t| t.iterator.current())
        .map(|p| p.docid)
        .min()
}

fn disjunctive(
    terms: &mut [QueryTerm],
    scorer: &Scorer,
    results: &mut TopScoredDocuments,
) -> Result<()> {
    while let Some(candidate) = min_docid(terms) {
        let mut score = 0.;
        for term in terms.iter_mut() {
            if let Some(posting) = term.iterator.current() {
                if posting.docid == candidate {
                    score += scorer.term_weight(term.idf, posting);
                    term.iterator.next()?;
                }
            }
        }
        results.add(candidate, score);
    }
    Ok(())
}

fn conjunctive(
    terms: &mut [QueryTerm],
    scorer: &Scorer,
    results: &mut TopScoredDocuments,
) -> Result<()> {
    if terms.is_empty() {
        return Ok(());
    }

    loop {
        // Stops as soon as one list is over
        let mut target = 0;
        for term in terms.iter() {
            match term.iterator.current() {
                Some(posting) => target = target.max(posting.docid),
                None => return Ok(()),
            }
        }

        // Moves the lagging lists to the target
        let mut aligned = true;
        for term in terms.iter_mut() {
            if let Some(posting) = term.iterator.current() {
                if posting.docid < target {
                    match term.iterator.next_geq(target)? {
                        Some(posting) => aligned &= posting.docid == target,
                        None => return Ok(()),
                    }
                }
            }
        }

        if aligned {
            let mut score = 0.;
            for term in terms.iter_mut() {
                if let Some(posting) = term.iterator.current() {
                    score += scorer.term_weight(term.idf, posting);
                    term.iterator.next()?;
                }
            }
            debug!("Document {} matches all the terms ({})", target, score);
            results.add(target, score);
        }
    }
}
