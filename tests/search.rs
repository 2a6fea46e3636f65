use ntest::assert_about_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rstest::rstest;

use helpers::index::TestIndex;
use spimi_index::{
    builder::BuilderOptions,
    config::Config,
    merger::MergerOptions,
    posting::VecPostingIterator,
    query::SearchOptions,
    scoring::{Scorer, ScoringFunction, ScoringParameters},
    search::{
        daat::search_daat,
        maxscore::{search_maxscore, MaxScoreOptions},
        QueryMode, QueryTerm, ScoredDocument, TopScoredDocuments,
    },
};

/// Initialize the logger
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scenario_terms(idf: f64) -> Vec<QueryTerm<'static>> {
    vec![
        QueryTerm::new(
            idf,
            f64::INFINITY,
            Box::new(VecPostingIterator::from(&[(1, 2), (3, 1)][..])),
        ),
        QueryTerm::new(
            idf,
            f64::INFINITY,
            Box::new(VecPostingIterator::from(&[(2, 5), (3, 2)][..])),
        ),
    ]
}

#[test]
fn test_disjunctive_scenario() {
    let lengths = vec![1u32; 4];
    let parameters = ScoringParameters::default();
    let scorer = Scorer {
        function: ScoringFunction::Tfidf,
        parameters,
        average_document_length: 1.,
        lengths: &lengths,
    };
    let idf = 0.5;

    let mut terms = scenario_terms(idf);
    let results = search_daat(&mut terms, &scorer, QueryMode::Disjunctive, 10).unwrap();
    assert_eq!(results.len(), 3);

    let score = |docid| {
        results
            .iter()
            .find(|d: &&ScoredDocument| d.docid == docid)
            .unwrap()
            .score
    };
    assert_about_eq!(score(1), parameters.tfidf(2, idf));
    assert_about_eq!(score(2), parameters.tfidf(5, idf));
    assert_about_eq!(
        score(3),
        parameters.tfidf(1, idf) + parameters.tfidf(2, idf)
    );
}

#[test]
fn test_conjunctive_scenario() {
    let lengths = vec![1u32; 4];
    let scorer = Scorer {
        function: ScoringFunction::Bm25,
        parameters: ScoringParameters::default(),
        average_document_length: 1.,
        lengths: &lengths,
    };

    let mut terms = scenario_terms(0.5);
    let results = search_daat(&mut terms, &scorer, QueryMode::Conjunctive, 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].docid, 3);
    assert_about_eq!(
        results[0].score,
        scorer.parameters.bm25(1, 0.5, 1, 1.) + scorer.parameters.bm25(2, 0.5, 1, 1.)
    );
}

#[test]
fn test_top_k() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut top = TopScoredDocuments::new(10);
    let mut all = Vec::new();
    for docid in 0..50u64 {
        let score: f64 = rng.gen_range(0.0..100.0);
        top.add(docid, score);
        all.push((docid, score));
    }
    assert_eq!(top.len(), 10);

    all.sort_by(|a, b| b.1.total_cmp(&a.1));
    let observed: Vec<_> = top
        .into_sorted_vec()
        .iter()
        .map(|d| (d.docid, d.score))
        .collect();
    assert_eq!(observed, all[..10].to_vec());
}

#[test]
fn test_top_k_fewer_documents() {
    let mut top = TopScoredDocuments::new(10);
    top.add(4, 1.);
    top.add(2, 3.);
    let docids: Vec<_> = top.into_sorted_vec().iter().map(|d| d.docid).collect();
    assert_eq!(docids, vec![2, 4]);
}

fn build_index() -> TestIndex {
    TestIndex::new(
        100,
        2000,
        10.,
        30,
        Some(3),
        Config {
            stemming_and_stopwords: false,
            ..Config::default()
        },
        &BuilderOptions {
            memory_budget: 64 * 1024,
            ..BuilderOptions::default()
        },
        &MergerOptions {
            skip_threshold: 32,
            ..MergerOptions::default()
        },
    )
}

#[rstest]
fn test_maxscore_equals_exhaustive(
    #[values(ScoringFunction::Tfidf, ScoringFunction::Bm25)] scoring: ScoringFunction,
    #[values(1, 10, 100)] top_k: usize,
    #[values(true, false)] length_based_ordering: bool,
) {
    init_logger();
    let data = build_index();
    let processor = data.processor(true);
    let mut rng = StdRng::seed_from_u64(17);

    for _ in 0..10 {
        let terms: Vec<String> = (0..rng.gen_range(1..6))
            .map(|_| helpers::documents::vocabulary_term(rng.gen_range(0..data.vocabulary_size)))
            .collect();

        let options = SearchOptions {
            scoring,
            top_k,
            ..SearchOptions::default()
        };
        let expected = processor.search_terms(&terms, &options).unwrap().unwrap();

        let infos = processor.lookup_terms(&terms);
        let scorer = Scorer {
            function: scoring,
            parameters: processor.config().scoring,
            average_document_length: processor.statistics().average_document_length as f64,
            lengths: processor.documents(),
        };
        let mut query_terms: Vec<QueryTerm> = infos
            .iter()
            .map(|info| {
                QueryTerm::new(
                    info.idf,
                    scorer.upper_bound(info),
                    Box::new(processor.postings().reader(info).unwrap()),
                )
            })
            .collect();
        let observed = search_maxscore(
            &mut query_terms,
            &scorer,
            top_k,
            MaxScoreOptions {
                length_based_ordering,
            },
        )
        .unwrap();

        assert_eq!(observed, expected, "query {:?}", terms);
    }
}

#[rstest]
fn test_conjunctive_matches_all_terms(#[values(1, 2, 3)] num_terms: usize) {
    let data = build_index();
    let processor = data.processor(false);
    let terms: Vec<String> = (0..num_terms)
        .map(helpers::documents::vocabulary_term)
        .collect();

    let options = SearchOptions {
        mode: QueryMode::Conjunctive,
        top_k: 2000,
        ..SearchOptions::default()
    };
    let results = processor.search_terms(&terms, &options).unwrap().unwrap();

    let expected: Vec<u64> = data
        .documents
        .iter()
        .enumerate()
        .filter(|(_, d)| terms.iter().all(|t| d.terms.contains(t)))
        .map(|(ix, _)| ix as u64)
        .collect();
    let mut observed: Vec<u64> = results.iter().map(|d| d.docid).collect();
    observed.sort();
    assert_eq!(observed, expected);
}
