use std::{collections::HashMap, fs, fs::File, io::BufReader};

use rstest::rstest;

use helpers::index::TestIndex;
use spimi_index::{
    base::{DocId, Len, TermFrequency},
    builder::{BlockPaths, BuilderOptions, Indexer, BLOCKS_FOLDER},
    config::Config,
    document_index::{read_document_length, DOCUMENT_INDEX_FILE},
    lexicon::{find_term, BlockLexiconEntry, TermInfo, LEXICON_FILE},
    merger::{read_block_postings, skip_run_length, Merger, MergerOptions},
    scoring::ScoringParameters,
};

/// Initialize the logger
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn build(compression: bool, skip_blocks: bool, delete_blocks: bool) -> TestIndex {
    TestIndex::new(
        200,
        500,
        8.,
        20,
        Some(7),
        Config {
            stemming_and_stopwords: false,
            compression,
            ..Config::default()
        },
        &BuilderOptions {
            memory_budget: 8 * 1024,
            ..BuilderOptions::default()
        },
        &MergerOptions {
            skip_blocks,
            skip_threshold: 16,
            delete_blocks,
            ..MergerOptions::default()
        },
    )
}

#[rstest]
fn test_merge_is_concatenation(#[values(false, true)] compression: bool) {
    init_logger();
    let data = build(compression, true, false);
    assert!(data.summary.blocks.len() > 2);

    // Concatenates the block posting lists in block order
    let mut concatenated = HashMap::<String, Vec<(DocId, TermFrequency)>>::new();
    for block in data.summary.blocks.iter() {
        let paths = BlockPaths::new(&data.dir.path().join(BLOCKS_FOLDER), block.number);
        let mut reader = BufReader::new(File::open(paths.lexicon).unwrap());
        while let Some(entry) = BlockLexiconEntry::read_from(&mut reader).unwrap() {
            let postings = read_block_postings(data.dir.path(), block.number, &entry).unwrap();
            assert_eq!(postings.len(), entry.posting_list_length as usize);
            concatenated
                .entry(entry.term.clone())
                .or_default()
                .extend(postings);
        }
    }

    let processor = data.processor(true);
    assert_eq!(processor.lexicon().len(), data.all_terms.len());
    assert_eq!(concatenated.len(), data.all_terms.len());

    for (term, expected) in data.all_terms.iter() {
        assert_eq!(&concatenated[term], expected);

        let info = processor.lexicon().get(term).unwrap();
        assert_eq!(info.posting_list_length as usize, expected.len());
        let postings: Vec<_> = processor
            .postings()
            .read_postings(info)
            .unwrap()
            .iter()
            .map(|p| (p.docid, p.frequency))
            .collect();
        assert_eq!(&postings, expected);
        assert!(postings.windows(2).all(|w| w[0].0 < w[1].0));
    }
}

#[rstest]
fn test_skip_blocks(#[values(false, true)] compression: bool) {
    let data = build(compression, true, true);
    let processor = data.processor(false);
    let mut with_skips = 0;

    for info in processor.lexicon().iter() {
        let length = info.posting_list_length as usize;
        if length > 16 {
            with_skips += 1;
            let run = skip_run_length(length);
            assert_eq!(info.num_skipblocks as usize, (length + run - 1) / run);

            let blocks = processor.postings().skip_blocks(info).unwrap();
            assert_eq!(blocks[0].start_docid_offset, info.offset_docids);
            assert_eq!(blocks[0].start_freq_offset, info.offset_freqs);
            let bytes: u64 = blocks.iter().map(|b| b.docid_byte_length as u64).sum();
            assert_eq!(bytes, info.docids_byte_length as u64);

            let expected = &data.all_terms[&info.term];
            let mut start = 0;
            for block in blocks.iter() {
                let end = (start + run).min(length);
                assert_eq!(block.max_docid, expected[end - 1].0);
                start = end;
            }
        } else {
            assert_eq!(info.num_skipblocks, 0);
        }
    }
    assert!(with_skips > 0);
}

#[test]
fn test_statistics_and_bounds() {
    let data = build(true, false, true);
    let processor = data.processor(true);
    let statistics = processor.statistics();
    assert_eq!(statistics.num_documents, 500);
    assert_eq!(statistics.num_blocks, data.summary.blocks.len() as u64);

    let total: usize = data.documents.iter().map(|d| d.terms.len()).sum();
    assert_eq!(statistics.average_document_length, (total / 500) as u64);

    let parameters = ScoringParameters::default();
    for (term, postings) in data.all_terms.iter() {
        let info = processor.lexicon().get(term).unwrap();
        let idf = ScoringParameters::idf(500, postings.len());
        assert_eq!(info.idf, idf);

        for &(docid, frequency) in postings.iter() {
            let length = data.documents[docid as usize].terms.len() as u32;
            assert!(parameters.tfidf(frequency, idf) <= info.tfidf_upper_bound as f64);
            assert!(
                parameters.bm25(
                    frequency,
                    idf,
                    length,
                    statistics.average_document_length as f64
                ) <= info.bm25_upper_bound as f64
            );
        }
    }
}

#[test]
fn test_blocks_are_deleted() {
    let data = build(true, false, true);
    assert!(!data.dir.path().join(BLOCKS_FOLDER).exists());

    let kept = build(true, false, false);
    assert!(BlockPaths::new(&kept.dir.path().join(BLOCKS_FOLDER), 0)
        .lexicon
        .exists());
}

#[test]
fn test_failed_deletion_is_not_an_error() {
    init_logger();
    let data = build(true, false, false);
    let blocks_folder = data.dir.path().join(BLOCKS_FOLDER);

    // The blocks folder cannot be removed once it holds a foreign file
    fs::write(blocks_folder.join("notes.txt"), "kept").unwrap();

    let config = Config {
        stemming_and_stopwords: false,
        compression: true,
        ..Config::default()
    };
    let options = MergerOptions {
        delete_blocks: true,
        ..MergerOptions::default()
    };
    let summary = Merger::new(data.dir.path(), &config, &options)
        .unwrap()
        .merge()
        .unwrap();
    assert_eq!(summary.num_terms as usize, data.all_terms.len());

    assert!(blocks_folder.join("notes.txt").exists());
    for block in data.summary.blocks.iter() {
        for path in BlockPaths::new(&blocks_folder, block.number).all() {
            assert!(!path.exists());
        }
    }

    let processor = data.processor(true);
    for (term, expected) in data.all_terms.iter() {
        let info = processor.lexicon().get(term).unwrap();
        assert_eq!(info.posting_list_length as usize, expected.len());
    }
}

#[test]
fn test_trailing_spaces_make_one_term() {
    let dir = temp_dir::TempDir::new().unwrap();
    let mut indexer = Indexer::new(
        dir.path(),
        Config::default(),
        &BuilderOptions::default(),
        &MergerOptions::default(),
    )
    .unwrap();
    indexer.add("d0", &["a", "a "]).unwrap();
    indexer.add("d1", &["a", "", "b"]).unwrap();
    indexer.build().unwrap();

    let path = dir.path().join(LEXICON_FILE);
    let mut reader = BufReader::new(File::open(&path).unwrap());
    let mut terms = Vec::new();
    while let Some(info) = TermInfo::read_from(&mut reader).unwrap() {
        terms.push((info.term, info.posting_list_length));
    }
    assert_eq!(terms, vec![("a".to_string(), 2), ("b".to_string(), 1)]);

    let found = find_term(&path, "a  ").unwrap().unwrap();
    assert_eq!(found.posting_list_length, 2);

    // Empty terms are not part of the document length
    assert_eq!(read_document_length(&dir.path().join(DOCUMENT_INDEX_FILE), 1).unwrap(), 2);
}

#[test]
fn test_lexicon_binary_search() {
    let data = build(false, false, true);
    let path = data.dir.path().join(LEXICON_FILE);
    let processor = data.processor(true);

    for term in data.all_terms.keys().take(50) {
        let found = find_term(&path, term).unwrap().unwrap();
        assert_eq!(&found, processor.lexicon().get(term).unwrap());
    }
    assert!(find_term(&path, "missing").unwrap().is_none());
    assert!(find_term(&path, "").unwrap().is_none());
}
