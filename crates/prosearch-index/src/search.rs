//! Executing searches and autocomplete requests.
//!
//! A search runs as a bounded two-step state machine: a strict phrase-prefix attempt, and
//! when that finds nothing a single fuzzy attempt. A search that starts fuzzy is not retried.

use std::sync::Arc;

use prosearch_config::SearchSettings;
use serde::{Deserialize, Serialize};

use crate::{
    IndexError,
    analyzer::AUTOCOMPLETE,
    connection::{Connection, Connector},
    query::{DID_YOU_MEAN, build_autocomplete_request, build_search_request},
    result::{SearchResult, map_hit},
    sink::EventSink,
};

/// Event origin for search diagnostics.
const ORIGIN: &str = "Searcher::search";

/// Settings a searcher runs with, echoed in every result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Base index name.
    pub base_name: String,
    /// Site root whose index is searched.
    pub root_id: Option<u64>,
    /// Analyzer applied to query text.
    pub analyzer: String,
    /// Language code results are filtered by; empty disables the filter.
    pub language: String,
    /// Host name results are filtered by; empty disables the filter.
    pub domain: String,
    /// Maximum hits per search.
    pub per_page: usize,
}

impl From<&SearchSettings> for SearchOptions {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            base_name: settings.index.clone(),
            root_id: settings.root_id,
            analyzer: settings.analyzer.clone(),
            language: settings.language.clone(),
            domain: settings.domain.clone(),
            per_page: settings.per_page,
        }
    }
}

/// A user query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free text.
    pub query: String,
    /// Content types every hit must carry.
    #[serde(default)]
    pub types: Vec<String>,
}

impl SearchQuery {
    /// A query without type restrictions.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            types: Vec::new(),
        }
    }

    /// Restricts hits to documents carrying all of `types`.
    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = types;
        self
    }
}

/// Search hits plus corrections.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResults {
    /// Hits, best first.
    pub hits: Vec<SearchResult>,
    /// Suggested corrections of the query text.
    #[serde(rename = "didYouMean")]
    pub did_you_mean: Vec<String>,
}

/// One autocomplete proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// The completed term.
    pub term: String,
    /// Display template for the term.
    pub template: String,
}

/// Autocomplete proposals plus corrections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Completions {
    /// Proposals, most frequent first.
    pub hits: Vec<Completion>,
    /// Suggested corrections of the typed prefix.
    #[serde(rename = "didYouMean")]
    pub did_you_mean: Vec<String>,
}

/// Steps of the search state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Phrase-prefix matching.
    Strict,
    /// Best-fields matching with automatic fuzziness.
    Fuzzy,
}

impl Attempt {
    /// The attempt that follows an empty result, if any.
    fn next(self) -> Option<Self> {
        match self {
            Self::Strict => Some(Self::Fuzzy),
            Self::Fuzzy => None,
        }
    }
}

/// Runs searches against a tenant's index.
pub struct Searcher<C> {
    /// Supplies backend connections.
    connector: C,
    /// Receives diagnostics.
    sink: Arc<dyn EventSink>,
    /// Search settings.
    options: SearchOptions,
}

impl<C: Connector> Searcher<C> {
    /// Creates a searcher.
    pub fn new(connector: C, sink: Arc<dyn EventSink>, options: SearchOptions) -> Self {
        Self {
            connector,
            sink,
            options,
        }
    }

    /// The search settings.
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Searches the configured index.
    ///
    /// With `fuzzy`, the search starts with fuzzy matching and is not retried. Returns empty
    /// results without a backend call when no connection is available or there is nothing to
    /// query.
    pub fn search(&self, query: &SearchQuery, fuzzy: bool) -> Result<SearchResults, IndexError> {
        let Some(connection) = self.connector.connect() else {
            return Ok(SearchResults::default());
        };
        let index = connection.index_name(&self.options.base_name, self.options.root_id);
        self.run_search(&connection, &index, query, fuzzy)
    }

    /// Searches an explicitly named index.
    pub fn search_in(
        &self,
        index: &str,
        query: &SearchQuery,
        fuzzy: bool,
    ) -> Result<SearchResults, IndexError> {
        let Some(connection) = self.connector.connect() else {
            return Ok(SearchResults::default());
        };
        self.run_search(&connection, index, query, fuzzy)
    }

    /// Proposes completions for a typed prefix in the configured index.
    pub fn autocomplete(&self, prefix: &str) -> Result<Completions, IndexError> {
        let Some(connection) = self.connector.connect() else {
            return Ok(Completions::default());
        };
        let index = connection.index_name(&self.options.base_name, self.options.root_id);
        self.run_autocomplete(&connection, &index, prefix)
    }

    /// Proposes completions from an explicitly named index.
    pub fn autocomplete_in(&self, index: &str, prefix: &str) -> Result<Completions, IndexError> {
        let Some(connection) = self.connector.connect() else {
            return Ok(Completions::default());
        };
        self.run_autocomplete(&connection, index, prefix)
    }

    /// Runs the strict attempt and, if it finds nothing, the fuzzy one.
    fn run_search(
        &self,
        connection: &Connection,
        index: &str,
        query: &SearchQuery,
        fuzzy: bool,
    ) -> Result<SearchResults, IndexError> {
        let mut attempt = if fuzzy {
            Attempt::Fuzzy
        } else {
            Attempt::Strict
        };

        loop {
            let request =
                match build_search_request(query, &self.options, attempt == Attempt::Fuzzy) {
                    Ok(request) => request,
                    Err(IndexError::EmptyQuery) => return Ok(SearchResults::default()),
                    Err(e) => return Err(e),
                };
            let response = connection.backend().search(index, &request)?;
            let did_you_mean = response.suggestions(DID_YOU_MEAN);
            let hits: Vec<SearchResult> = response
                .hits
                .hits
                .into_iter()
                .filter_map(|hit| map_hit(hit, &self.options))
                .collect();

            if hits.is_empty()
                && let Some(next) = attempt.next()
            {
                self.sink.debug(
                    ORIGIN,
                    &format!("No hits for \"{}\" in {index}, retrying fuzzy.", query.query),
                );
                attempt = next;
                continue;
            }
            return Ok(SearchResults { hits, did_you_mean });
        }
    }

    /// Runs an autocomplete request.
    fn run_autocomplete(
        &self,
        connection: &Connection,
        index: &str,
        prefix: &str,
    ) -> Result<Completions, IndexError> {
        let request = match build_autocomplete_request(prefix, &self.options.analyzer) {
            Ok(request) => request,
            Err(IndexError::EmptyQuery) => return Ok(Completions::default()),
            Err(e) => return Err(e),
        };
        let response = connection.backend().search(index, &request)?;
        let hits = response
            .bucket_keys(AUTOCOMPLETE)
            .into_iter()
            .map(|key| Completion {
                term: key.clone(),
                template: key,
            })
            .collect();

        Ok(Completions {
            hits,
            did_you_mean: response.suggestions(DID_YOU_MEAN),
        })
    }
}
