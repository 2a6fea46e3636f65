//! Query processing over a built index

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use derivative::Derivative;
use log::{debug, info};
use serde::Serialize;

use crate::{
    base::{normalize_term, DocId, Len},
    config::Config,
    document_index::{DocumentIndex, DOCUMENT_INDEX_FILE},
    error::Result,
    lexicon::{Lexicon, TermInfo, LEXICON_FILE},
    parser::{Parser, TsvParser},
    posting::{PostingFiles, PostingIterator},
    scoring::{Scorer, ScoringFunction},
    search::{
        daat::search_daat,
        maxscore::{search_maxscore, MaxScoreOptions},
        QueryMode, QueryTerm, ScoredDocument,
    },
    statistics::{Statistics, STATISTICS_FILE},
};

#[derive(Derivative, Clone, Copy)]
#[derivative(Default)]
pub struct SearchOptions {
    #[derivative(Default(value = "QueryMode::Disjunctive"))]
    pub mode: QueryMode,

    #[derivative(Default(value = "ScoringFunction::Tfidf"))]
    pub scoring: ScoringFunction,

    #[derivative(Default(value = "10"))]
    pub top_k: usize,

    /// Uses MaxScore dynamic pruning (disjunctive queries only)
    #[derivative(Default(value = "false"))]
    pub max_score: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RankedDocument {
    pub docid: DocId,
    pub name: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    Ranked(Vec<RankedDocument>),
    /// No query term is in the lexicon
    VagueQuery,
}

/// Loaded index, shareable between threads
pub struct QueryProcessor {
    folder: PathBuf,
    config: Config,
    statistics: Statistics,
    lexicon: Lexicon,
    documents: DocumentIndex,
    postings: PostingFiles,
    parser: TsvParser,
}

impl QueryProcessor {
    /// Loads an index; the configuration is read first so that nothing is
    /// loaded if no index was built
    pub fn open(folder: &Path, in_memory: bool) -> Result<Self> {
        let config = Config::load(folder)?;
        let statistics = Statistics::load(&folder.join(STATISTICS_FILE))?;
        let lexicon = Lexicon::load(&folder.join(LEXICON_FILE))?;
        let documents = DocumentIndex::load(&folder.join(DOCUMENT_INDEX_FILE))?;
        let postings = PostingFiles::open(folder, config.compression_scheme(), in_memory)?;

        info!(
            "Opened index {} ({} documents, {} terms)",
            folder.display(),
            statistics.num_documents,
            lexicon.len()
        );
        Ok(Self {
            folder: folder.to_path_buf(),
            parser: TsvParser::new(config.stemming_and_stopwords),
            config,
            statistics,
            lexicon,
            documents,
            postings,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn documents(&self) -> &DocumentIndex {
        &self.documents
    }

    pub fn postings(&self) -> &PostingFiles {
        &self.postings
    }

    /// Normalized, deduplicated query terms (in query order)
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.parser
            .tokenize(query)
            .into_iter()
            .map(|term| normalize_term(&term).to_string())
            .filter(|term| !term.is_empty())
            .filter(|term| seen.insert(term.clone()))
            .collect()
    }

    /// Term information of the query terms found in the lexicon
    pub fn lookup_terms(&self, terms: &[String]) -> Vec<&TermInfo> {
        terms
            .iter()
            .filter_map(|term| {
                let info = self.lexicon.get(term);
                if info.is_none() {
                    debug!("Term {} is not in the lexicon", term);
                }
                info
            })
            .collect()
    }

    fn scorer(&self, function: ScoringFunction) -> Scorer<'_> {
        Scorer {
            function,
            parameters: self.config.scoring,
            average_document_length: self.statistics.average_document_length as f64,
            lengths: &self.documents,
        }
    }

    /// Scores the documents for already normalized terms
    pub fn search_terms(
        &self,
        terms: &[String],
        options: &SearchOptions,
    ) -> Result<Option<Vec<ScoredDocument>>> {
        let infos = self.lookup_terms(terms);
        if infos.is_empty() {
            return Ok(None);
        }

        let scorer = self.scorer(options.scoring);
        let mut query_terms = infos
            .into_iter()
            .map(|info| {
                let reader = self.postings.reader(info)?;
                let iterator: Box<dyn PostingIterator + '_> = Box::new(reader);
                Ok(QueryTerm::new(info.idf, scorer.upper_bound(info), iterator))
            })
            .collect::<Result<Vec<_>>>()?;

        let results = if options.max_score && options.mode == QueryMode::Disjunctive {
            search_maxscore(
                &mut query_terms,
                &scorer,
                options.top_k,
                MaxScoreOptions::default(),
            )?
        } else {
            search_daat(&mut query_terms, &scorer, options.mode, options.top_k)?
        };
        Ok(Some(results))
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchOutcome> {
        let terms = self.query_terms(query);
        debug!("Query {:?} -> {:?}", query, terms);

        Ok(match self.search_terms(&terms, options)? {
            None => SearchOutcome::VagueQuery,
            Some(results) => SearchOutcome::Ranked(
                results
                    .into_iter()
                    .map(|document| RankedDocument {
                        docid: document.docid,
                        name: self
                            .documents
                            .name(document.docid)
                            .unwrap_or_default()
                            .to_string(),
                        score: document.score,
                    })
                    .collect(),
            ),
        })
    }
}
