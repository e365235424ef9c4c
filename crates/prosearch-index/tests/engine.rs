//! End-to-end tests of indexing and searching against the in-memory backend.

// Integration tests live outside cfg(test) by design
#![allow(clippy::tests_outside_test_module)]

use std::sync::{Arc, Mutex, PoisonError};

use prosearch_config::Credentials;
use prosearch_index::{
    BackendError, Connection, ConnectionProvider, Document, IndexDefinition, IndexError,
    IndexRecord, Indexer, IndexerOptions, Level, MemoryBackend, MemoryRecordStore,
    MicrodataAnnotation, Query, RecordFilter, RecordState, RecordStore, RecordingSink,
    SearchBackend, SearchOptions, SearchQuery, SearchRequest, SearchResponse, Searcher,
    build_document, index_name,
};
use serde_json::json;

/// Wraps the in-memory backend and records search requests.
#[derive(Default)]
struct CountingBackend {
    /// The wrapped backend.
    inner: MemoryBackend,
    /// Search requests served, in order.
    requests: Mutex<Vec<SearchRequest>>,
}

impl CountingBackend {
    /// Number of search requests served so far.
    fn searches(&self) -> usize {
        self.requests().len()
    }

    /// The search requests served so far.
    fn requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SearchBackend for CountingBackend {
    fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        self.inner.index_exists(index)
    }

    fn create_index(&self, index: &str, definition: &IndexDefinition) -> Result<(), BackendError> {
        self.inner.create_index(index, definition)
    }

    fn document_exists(&self, index: &str, id: &str) -> Result<bool, BackendError> {
        self.inner.document_exists(index, id)
    }

    fn delete_by_query(&self, index: &str, query: &Query) -> Result<u64, BackendError> {
        self.inner.delete_by_query(index, query)
    }

    fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), BackendError> {
        self.inner.index_document(index, id, document)
    }

    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.inner.search(index, request)
    }
}

/// Builds a record with a text payload.
fn record(id: u64, title: &str, text: &str, language: &str, types: &str) -> IndexRecord {
    IndexRecord {
        id,
        page_id: id,
        url: format!("https://example.org/{id}"),
        domain: "example.org".into(),
        language: language.into(),
        title: title.into(),
        description: String::new(),
        document: json!({ "text": text }).to_string(),
        types: types.into(),
        state: RecordState::Active,
        last_indexed: 0,
    }
}

/// A store with five records: one in German, one annotated as an event and one on another
/// host.
fn store() -> MemoryRecordStore {
    let mut store = MemoryRecordStore::new();
    let mut foreign = record(5, "Acme Mirror", "Hosting elsewhere", "en", r#"["Article"]"#);
    foreign.domain = "other.org".into();
    let records = [
        record(1, "Acme Cloud", "Hosting for everyone", "en", r#"["Article"]"#),
        record(2, "Acme Events", "Meet the team", "en", ""),
        record(3, "Acme Wolke", "Hosting für alle", "de", r#"["Article"]"#),
        record(4, "Pricing", "Simple pricing for hosting", "en", "[]"),
        foreign,
    ];
    for record in &records {
        store.save_record(record).unwrap();
    }
    store.add_annotation(MicrodataAnnotation {
        id: 1,
        record_id: 2,
        kind: "Event".into(),
    });
    store
}

fn indexer_options() -> IndexerOptions {
    IndexerOptions {
        base_name: "prosearch".into(),
        analyzer: "english".into(),
        batch_size: 10,
    }
}

fn search_options(language: &str) -> SearchOptions {
    SearchOptions {
        base_name: "prosearch".into(),
        root_id: None,
        analyzer: "english".into(),
        language: language.into(),
        domain: "example.org".into(),
        per_page: 10,
    }
}

/// Indexes the fixture store into a counting backend.
fn indexed() -> (Arc<CountingBackend>, Connection) {
    let backend = Arc::new(CountingBackend::default());
    let connection = Connection::new("abc", backend.clone());
    let mut indexer = Indexer::new(
        store(),
        connection.clone(),
        Arc::new(RecordingSink::new()),
        indexer_options(),
    );
    let stats = indexer.index_all(None).unwrap();
    assert_eq!(stats.indexed, 5);
    (backend, connection)
}

fn hit_ids(searcher: &Searcher<Connection>, query: &SearchQuery) -> Vec<u64> {
    searcher
        .search(query, false)
        .unwrap()
        .hits
        .iter()
        .map(|hit| hit.id)
        .collect()
}

#[test]
fn upsert_is_idempotent_and_timestamps_increase() {
    let backend = Arc::new(MemoryBackend::new());
    let connection = Connection::new("abc", backend.clone());
    let mut indexer = Indexer::new(
        store(),
        connection,
        Arc::new(RecordingSink::new()),
        indexer_options(),
    );

    indexer.index_all(Some(1)).unwrap();
    let first = indexer.store().find_record(1).unwrap().unwrap().last_indexed;
    indexer.index_all(Some(1)).unwrap();
    let second = indexer.store().find_record(1).unwrap().unwrap().last_indexed;

    assert_eq!(backend.document_count("prosearch_abc"), 1);
    assert!(second > first);
}

#[test]
fn index_names_are_deterministic_per_root() {
    assert_eq!(
        index_name("prosearch", "abc", Some(1)),
        index_name("prosearch", "abc", Some(1))
    );
    assert_ne!(
        index_name("prosearch", "abc", Some(1)),
        index_name("prosearch", "abc", Some(2))
    );
}

#[test]
fn annotation_types_are_deduplicated() {
    let mut store = MemoryRecordStore::new();
    store
        .save_record(&record(1, "Acme", "", "en", r#"["Article"]"#))
        .unwrap();
    for (id, kind) in [(1, "Article"), (2, "Event")] {
        store.add_annotation(MicrodataAnnotation {
            id,
            record_id: 1,
            kind: kind.into(),
        });
    }
    let document = build_document(&store, 1).unwrap();
    assert_eq!(document.types, vec!["Article", "Event"]);
}

#[test]
fn strict_hits_need_a_single_request() {
    let (backend, connection) = indexed();
    let searcher = Searcher::new(
        connection,
        Arc::new(RecordingSink::new()),
        search_options("en"),
    );

    let results = searcher.search(&SearchQuery::new("acme"), false).unwrap();
    assert!(!results.hits.is_empty());
    assert_eq!(backend.searches(), 1);
}

#[test]
fn empty_strict_result_retries_fuzzy_exactly_once() {
    let (backend, connection) = indexed();
    let sink = Arc::new(RecordingSink::new());
    let searcher = Searcher::new(connection, sink.clone(), search_options("en"));

    let results = searcher.search(&SearchQuery::new("zzzzzz"), false).unwrap();
    assert!(results.hits.is_empty());
    assert_eq!(backend.searches(), 2);
    assert_eq!(sink.messages(Level::Debug).len(), 1);

    let results = searcher.search(&SearchQuery::new("zzzzzz"), true).unwrap();
    assert!(results.hits.is_empty());
    assert_eq!(backend.searches(), 3);
}

#[test]
fn fuzzy_retry_finds_misspelled_terms() {
    let (_, connection) = indexed();
    let searcher = Searcher::new(
        connection,
        Arc::new(RecordingSink::new()),
        search_options("en"),
    );

    let results = searcher.search(&SearchQuery::new("prising"), false).unwrap();
    let ids: Vec<u64> = results.hits.iter().map(|hit| hit.id).collect();
    assert_eq!(ids, vec![4]);
}

#[test]
fn language_and_type_filters_restrict_hits() {
    let (_, connection) = indexed();
    let sink = Arc::new(RecordingSink::new());

    let english = Searcher::new(connection.clone(), sink.clone(), search_options("en"));
    assert_eq!(hit_ids(&english, &SearchQuery::new("acme")), vec![1, 2]);
    assert_eq!(
        hit_ids(
            &english,
            &SearchQuery::new("acme").with_types(vec!["Event".into()])
        ),
        vec![2]
    );
    assert!(
        hit_ids(
            &english,
            &SearchQuery::new("acme").with_types(vec!["event".into()])
        )
        .is_empty()
    );

    let german = Searcher::new(connection, sink, search_options("de"));
    assert_eq!(hit_ids(&german, &SearchQuery::new("acme")), vec![3]);
}

#[test]
fn domain_filter_excludes_other_hosts() {
    let (_, connection) = indexed();
    let sink = Arc::new(RecordingSink::new());

    let local = Searcher::new(connection.clone(), sink.clone(), search_options("en"));
    assert_eq!(hit_ids(&local, &SearchQuery::new("acme")), vec![1, 2]);
    assert!(hit_ids(&local, &SearchQuery::new("mirror")).is_empty());

    let foreign = Searcher::new(connection, sink, SearchOptions {
        domain: "other.org".into(),
        ..search_options("en")
    });
    assert_eq!(hit_ids(&foreign, &SearchQuery::new("acme")), vec![5]);
}

#[test]
fn fuzzy_retry_keeps_the_type_filter() {
    let (backend, connection) = indexed();
    let searcher = Searcher::new(
        connection,
        Arc::new(RecordingSink::new()),
        search_options("en"),
    );

    let articles = SearchQuery::new("prising").with_types(vec!["Article".into()]);
    assert!(hit_ids(&searcher, &articles).is_empty());

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    let retry = serde_json::to_value(&requests[1]).unwrap();
    assert_eq!(retry["query"]["bool"]["must"][0]["multi_match"]["type"], "best_fields");
    let type_filter = json!({"term": {"types": {"value": "Article", "case_insensitive": false}}});
    assert!(
        retry["query"]["bool"]["filter"]
            .as_array()
            .unwrap()
            .contains(&type_filter)
    );

    let misspelled = SearchQuery::new("clowd").with_types(vec!["Article".into()]);
    assert_eq!(hit_ids(&searcher, &misspelled), vec![1]);
}

#[test]
fn payload_values_other_than_text_keep_the_document_searchable() {
    let mut store = MemoryRecordStore::new();
    let mut widget = record(1, "Widget", "", "en", "");
    widget.document = r#"{"text": "Quantum hosting", "h1": null, "h2": 3}"#.into();
    store.save_record(&widget).unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let connection = Connection::new("abc", backend.clone());
    let mut indexer = Indexer::new(
        store,
        connection.clone(),
        Arc::new(RecordingSink::new()),
        indexer_options(),
    );
    indexer.index_all(None).unwrap();

    let stored = backend.document("prosearch_abc", "1").unwrap();
    assert_eq!(stored.fields["text"], "Quantum hosting");
    assert_eq!(stored.fields["h2"], "3");
    assert!(!stored.fields.contains_key("h1"));

    let searcher = Searcher::new(
        connection,
        Arc::new(RecordingSink::new()),
        search_options("en"),
    );
    assert_eq!(hit_ids(&searcher, &SearchQuery::new("quantum")), vec![1]);
}

#[test]
fn results_echo_options_and_types() {
    let (_, connection) = indexed();
    let options = search_options("en");
    let searcher = Searcher::new(connection, Arc::new(RecordingSink::new()), options.clone());

    let results = searcher
        .search(&SearchQuery::new("meet the team"), false)
        .unwrap();
    let hit = &results.hits[0];
    assert_eq!(hit.id, 2);
    assert_eq!(hit.types, vec!["Event"]);
    assert_eq!(hit.options, options);
    assert!(hit.score > 0.0);
}

#[test]
fn autocomplete_proposes_terms_by_prefix() {
    let (_, connection) = indexed();
    let searcher = Searcher::new(
        connection,
        Arc::new(RecordingSink::new()),
        search_options("en"),
    );

    let completions = searcher.autocomplete("Acm").unwrap();
    assert!(!completions.hits.is_empty());
    assert!(completions.hits.iter().all(|c| c.term.starts_with("acm")));
    assert!(completions.hits.iter().all(|c| c.term == c.template));

    assert!(searcher.autocomplete("   ").unwrap().hits.is_empty());
}

#[test]
fn batches_are_ordered_limited_and_active_only() {
    let mut store = MemoryRecordStore::new();
    for (id, last_indexed) in [(1, 30), (2, 10), (3, 20), (4, 0)] {
        let mut record = record(id, "T", "", "en", "");
        record.last_indexed = last_indexed;
        if id == 4 {
            record.state = RecordState::Inactive;
        }
        store.save_record(&record).unwrap();
    }

    let records = store.find_records(&RecordFilter::active(None), 2).unwrap();
    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 3]);

    let backend = Arc::new(MemoryBackend::new());
    let mut indexer = Indexer::new(
        store,
        Connection::new("abc", backend.clone()),
        Arc::new(RecordingSink::new()),
        IndexerOptions {
            batch_size: 2,
            ..indexer_options()
        },
    );
    let batch: Vec<u64> = indexer
        .fetch_batch(None, 3)
        .unwrap()
        .iter()
        .map(|(_, document)| document.id)
        .collect();
    assert_eq!(batch, vec![2, 3, 1]);

    let stats = indexer.index_all(None).unwrap();
    assert_eq!(stats.selected, 2);
    assert!(backend.document("prosearch_abc", "2").is_some());
    assert!(backend.document("prosearch_abc", "3").is_some());
    assert!(backend.document("prosearch_abc", "1").is_none());
}

#[test]
fn batches_follow_store_order_rather_than_urls() {
    let mut store = MemoryRecordStore::new();
    let mut a = record(1, "A", "", "en", "");
    a.url = "https://example.org/a".into();
    a.last_indexed = 50;
    let mut z = record(2, "Z", "", "en", "");
    z.url = "https://example.org/z".into();
    z.last_indexed = 10;
    store.save_record(&a).unwrap();
    store.save_record(&z).unwrap();

    let indexer = Indexer::new(
        store,
        Connection::new("abc", Arc::new(MemoryBackend::new())),
        Arc::new(RecordingSink::new()),
        indexer_options(),
    );
    let batch = indexer.fetch_batch(None, 10).unwrap();
    let ids: Vec<u64> = batch.iter().map(|(_, document)| document.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(batch[0].0, "https://example.org/z");
}

#[test]
fn unavailable_backend_scenario() {
    let mut store = MemoryRecordStore::new();
    let mut acme = record(1, "Acme Cloud", "", "en", "");
    acme.document = String::new();
    store.save_record(&acme).unwrap();

    let document = build_document(&store, 1).unwrap();
    let value = serde_json::to_value(&document).unwrap();
    assert_eq!(value["id"], 1);
    assert_eq!(value["title"], "Acme Cloud");
    assert_eq!(value["description"], "");
    assert_eq!(value["types"], json!([]));

    let sink = Arc::new(RecordingSink::new());
    let provider = ConnectionProvider::new(
        Credentials::License {
            signature: "abc".into(),
        },
        sink.clone(),
    );
    let mut indexer = Indexer::new(store, provider, sink.clone(), indexer_options());

    assert!(matches!(
        indexer.index_all(None),
        Err(IndexError::Unavailable)
    ));
    assert_eq!(
        indexer.store().find_record(1).unwrap().unwrap().last_indexed,
        0
    );
    assert_eq!(sink.messages(Level::Error).len(), 1);
}
