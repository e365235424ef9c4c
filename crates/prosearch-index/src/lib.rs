//! Indexing and query engine for prosearch.
//!
//! This crate turns content records into search documents and serves queries against a
//! tenant's index. It handles:
//! - Resolving credentials into a backend connection ([`ConnectionProvider`])
//! - Index naming, analyzers and field mappings ([`ensure_index`])
//! - Building documents from records and annotations ([`build_document`])
//! - Batched, idempotent indexing and deletion ([`Indexer`])
//! - Search with fuzzy fallback, suggestions and autocomplete ([`Searcher`])
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use prosearch_index::{
//!     Connection, Indexer, IndexerOptions, MemoryBackend, MemoryRecordStore, SearchOptions,
//!     SearchQuery, Searcher, SilentSink,
//! };
//!
//! let connection = Connection::new("tenant", Arc::new(MemoryBackend::new()));
//! let sink = Arc::new(SilentSink);
//! let mut indexer = Indexer::new(
//!     MemoryRecordStore::new(),
//!     connection.clone(),
//!     sink.clone(),
//!     IndexerOptions {
//!         base_name: "prosearch".into(),
//!         analyzer: "english".into(),
//!         batch_size: 5,
//!     },
//! );
//! let stats = indexer.index_all(None).unwrap();
//! assert_eq!(stats.selected, 0);
//!
//! let searcher = Searcher::new(connection, sink, SearchOptions {
//!     base_name: "prosearch".into(),
//!     root_id: None,
//!     analyzer: "english".into(),
//!     language: String::new(),
//!     domain: String::new(),
//!     per_page: 10,
//! });
//! let results = searcher.search(&SearchQuery::new(""), false).unwrap();
//! assert!(results.hits.is_empty());
//! ```

#![warn(missing_docs)]

mod analyzer;
mod backend;
mod connection;
mod document;
mod error;
mod indexer;
mod query;
mod response;
mod result;
mod schema;
mod search;
mod sink;
mod store;

pub use analyzer::{
    AUTOCOMPLETE, Analysis, AnalyzerDefinition, AnalyzerSet, GENERIC, Pipeline,
    TokenFilterDefinition, parse_language,
};
pub use backend::{HttpBackend, HttpSettings, MemoryBackend, SearchBackend, decode_cloud_id};
pub use connection::{
    Connection, ConnectionProvider, Connector, CredentialsSource, NO_CONNECTION,
};
pub use document::{Document, build, build_document, parse_fields, parse_types};
pub use error::{BackendError, IndexError};
pub use indexer::{DeleteOutcome, IndexStats, Indexer, IndexerOptions};
pub use query::{
    Aggregation, BoolQuery, DID_YOU_MEAN, DirectGenerator, Fuzziness, Highlight,
    HighlightField, MatchType, MultiMatchQuery, PhraseSuggester, PrefixQuery, Query,
    SearchRequest, SortOrder, SuggestHighlight, Suggestion, TermQuery, TermsAggregation,
    build_autocomplete_request, build_search_request,
};
pub use response::{
    AggregationResult, Bucket, HitSource, Hits, RawHit, SearchResponse, SuggestEntry,
    SuggestOption,
};
pub use result::{SearchResult, map_hit};
pub use schema::{
    FieldMapping, FieldType, IndexDefinition, IndexSettings, Mappings, ensure_index,
    index_definition, index_name,
};
pub use search::{Completion, Completions, SearchOptions, SearchQuery, SearchResults, Searcher};
pub use sink::{Event, EventSink, Level, RecordingSink, SilentSink, TracingSink};
pub use store::{
    IndexRecord, MemoryRecordStore, MicrodataAnnotation, RecordFilter, RecordState, RecordStore,
};
