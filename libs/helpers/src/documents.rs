use rand::{self, RngCore};
use rand_distr::{Distribution, Poisson};
use std::cmp::min;

/// Term of the test vocabulary
pub fn vocabulary_term(term_ix: usize) -> String {
    format!("term{:05}", term_ix)
}

pub struct TestDocument {
    pub name: String,
    /// Terms in document order (with repetitions)
    pub terms: Vec<String>,
}

/// Creates a random document: the number of distinct terms and the number
/// of occurrences of each term follow Poisson distributions
pub fn create_document(
    name: &str,
    lambda_words: f64,
    max_words: usize,
    vocabulary_size: usize,
    rng: &mut dyn RngCore,
) -> TestDocument {
    let poi = Poisson::new(lambda_words).unwrap();
    let num_words = 1 + poi.sample(rng) as usize;

    let term_ids =
        rand::seq::index::sample(rng, vocabulary_size, min(num_words, max_words)).into_vec();
    let repetitions = Poisson::new(0.5).unwrap();

    let mut document = TestDocument {
        name: name.to_string(),
        terms: Vec::new(),
    };

    for term_ix in term_ids.iter() {
        let count = 1 + repetitions.sample(rng) as usize;
        for _ in 0..count {
            document.terms.push(vocabulary_term(*term_ix));
        }
    }

    document
}

/// Formats a document as a collection line
pub fn document_line(document: &TestDocument) -> String {
    format!("{}\t{}", document.name, document.terms.join(" "))
}
