use std::collections::HashMap;

use rand::{rngs::StdRng, SeedableRng};
use temp_dir::TempDir;

use crate::documents::{create_document, TestDocument};
use spimi_index::{
    base::{DocId, Posting, TermFrequency},
    builder::{BuilderOptions, IndexSummary, Indexer},
    config::Config,
    merger::MergerOptions,
    posting::PostingIterator,
    query::QueryProcessor,
};

/// A randomly generated index, with the postings expected for each term
pub struct TestIndex {
    pub dir: TempDir,
    pub vocabulary_size: usize,
    pub all_terms: HashMap<String, Vec<(DocId, TermFrequency)>>,
    pub documents: Vec<TestDocument>,
    pub summary: IndexSummary,
}

impl TestIndex {
    pub fn new(
        vocabulary_size: usize,
        document_count: u64,
        lambda_words: f64,
        max_words: usize,
        seed: Option<u64>,
        config: Config,
        options: &BuilderOptions,
        merger_options: &MergerOptions,
    ) -> Self {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let mut indexer = Indexer::new(dir.path(), config, options, merger_options)
            .expect("Could not create the indexer");

        let mut all_terms = HashMap::<String, Vec<(DocId, TermFrequency)>>::new();
        let mut documents = Vec::<TestDocument>::new();
        let mut rng = if let Some(seed) = seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };

        // Creates documents
        for ix in 0..document_count {
            let document = create_document(
                &format!("D{}", ix),
                lambda_words,
                max_words,
                vocabulary_size,
                &mut rng,
            );

            // Add those to the index
            let docid = indexer
                .add(&document.name, &document.terms)
                .expect("Error while adding terms to the index");
            assert_eq!(docid, ix);

            for term in document.terms.iter() {
                let postings = all_terms.entry(term.clone()).or_default();
                match postings.last_mut() {
                    Some((last, frequency)) if *last == docid => *frequency += 1,
                    _ => postings.push((docid, 1)),
                }
            }

            documents.push(document);
        }

        // Build the index
        let summary = indexer.build().expect("Error while building the index");
        Self {
            dir,
            vocabulary_size,
            all_terms,
            documents,
            summary,
        }
    }

    pub fn processor(&self, in_memory: bool) -> QueryProcessor {
        QueryProcessor::open(self.dir.path(), in_memory).expect("Could not open the index")
    }
}

/// Checks that an iterator yields exactly the expected postings
pub fn check_postings(expected: &[(DocId, TermFrequency)], observed: &mut dyn PostingIterator) {
    assert_eq!(observed.length(), expected.len());
    for &(docid, frequency) in expected {
        let posting = observed
            .current()
            .expect("The posting list contains less entries");
        assert_eq!(
            posting,
            Posting::new(docid, frequency),
            "Expected ({}, {}), got {}",
            docid,
            frequency,
            posting
        );
        observed.next().expect("Error while reading postings");
    }
    assert!(observed.is_exhausted(), "The posting list contains more entries");
}
