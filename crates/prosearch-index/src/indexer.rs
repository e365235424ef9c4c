//! Pull-based indexing of stored records.
//!
//! The [`Indexer`] selects a bounded batch of active records (least recently indexed first),
//! builds their documents, makes sure each target index exists and upserts the documents one
//! at a time. A failing document is reported and counted; it never aborts the batch.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use prosearch_config::Config;

use crate::{
    Document, IndexError,
    backend::SearchBackend,
    connection::{Connection, Connector},
    document::build_document,
    query::{Query, TermQuery},
    schema::ensure_index,
    sink::EventSink,
    store::{IndexRecord, RecordFilter, RecordStore},
};

/// Event origin for indexing runs.
const ORIGIN: &str = "Indexer::index_all";

/// Event origin for deletions.
const DELETE_ORIGIN: &str = "Indexer::delete";

/// Settings an indexer runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerOptions {
    /// Base index name.
    pub base_name: String,
    /// Analyzer for newly created indices.
    pub analyzer: String,
    /// Maximum number of records per run.
    pub batch_size: usize,
}

impl From<&Config> for IndexerOptions {
    fn from(config: &Config) -> Self {
        Self {
            base_name: config.search.index.clone(),
            analyzer: config.search.analyzer.clone(),
            batch_size: config.indexing.batch_size,
        }
    }
}

/// Statistics from an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Documents selected for the run.
    pub selected: usize,
    /// Documents written to the backend.
    pub indexed: usize,
    /// Documents whose upsert failed.
    pub failed: usize,
    /// Indices created during the run.
    pub created_indices: Vec<String>,
    /// Failures as (record id, message).
    pub errors: Vec<(u64, String)>,
}

impl IndexStats {
    /// Returns true if no document failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Result of deleting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No such record.
    Missing,
    /// The record and its annotations were deleted locally.
    Deleted {
        /// Whether a backend document was deleted as well.
        remote: bool,
    },
    /// No connection; nothing was deleted.
    Unavailable,
}

/// A document selected for indexing together with the page it belongs to.
struct Pending {
    /// Canonical URL of the record.
    url: String,
    /// Page the record was crawled from.
    page_id: u64,
    /// The built document.
    document: Document,
}

/// Indexes records from a store into a backend.
pub struct Indexer<S, C> {
    /// Source of records; receives updated timestamps.
    store: S,
    /// Supplies backend connections.
    connector: C,
    /// Receives diagnostics.
    sink: Arc<dyn EventSink>,
    /// Indexing settings.
    options: IndexerOptions,
}

impl<S: RecordStore, C: Connector> Indexer<S, C> {
    /// Creates an indexer.
    pub fn new(store: S, connector: C, sink: Arc<dyn EventSink>, options: IndexerOptions) -> Self {
        Self {
            store,
            connector,
            sink,
            options,
        }
    }

    /// The record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the indexer, returning the record store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Selects up to `limit` active records, or only record `id`, and builds their documents.
    ///
    /// Documents come as (URL, document) pairs in store order, least recently indexed first.
    /// A record sharing the URL of an earlier one replaces it in place. Records that vanish
    /// while building are skipped.
    pub fn fetch_batch(
        &self,
        id: Option<u64>,
        limit: usize,
    ) -> Result<Vec<(String, Document)>, IndexError> {
        Ok(self
            .pending(id, limit)?
            .into_iter()
            .map(|pending| (pending.url, pending.document))
            .collect())
    }

    /// Builds the pending documents of a batch, in store order.
    fn pending(&self, id: Option<u64>, limit: usize) -> Result<Vec<Pending>, IndexError> {
        let records = self.store.find_records(&RecordFilter::active(id), limit)?;
        let mut batch: Vec<Pending> = Vec::with_capacity(records.len());
        for record in records {
            match build_document(&self.store, record.id) {
                Ok(document) => {
                    let pending = Pending {
                        url: record.url.clone(),
                        page_id: record.page_id,
                        document,
                    };
                    match batch.iter_mut().find(|p| p.url == pending.url) {
                        Some(slot) => *slot = pending,
                        None => batch.push(pending),
                    }
                }
                Err(IndexError::NotFound { id }) => {
                    tracing::debug!(id, "record vanished before indexing");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(batch)
    }

    /// Writes a document, replacing any previous version, and stamps its record.
    ///
    /// Backend failures are reported to the sink and returned; the record keeps its previous
    /// timestamp.
    pub fn upsert(
        &mut self,
        connection: &Connection,
        index: &str,
        document: &Document,
    ) -> Result<(), IndexError> {
        if let Err(e) = write_document(connection, index, document) {
            self.sink.error(ORIGIN, &e.to_string());
            return Err(e);
        }

        if let Some(record) = self.store.find_record(document.id)? {
            self.store.save_record(&stamped(record))?;
        }
        Ok(())
    }

    /// Indexes one batch: the record `id`, or the least recently indexed active records.
    ///
    /// Returns [`IndexError::Unavailable`] without touching the store when no connection can be
    /// established.
    pub fn index_all(&mut self, id: Option<u64>) -> Result<IndexStats, IndexError> {
        let Some(connection) = self.connector.connect() else {
            self.sink.error(ORIGIN, &IndexError::Unavailable.to_string());
            return Err(IndexError::Unavailable);
        };

        let batch = self.pending(id, self.options.batch_size)?;
        let mut stats = IndexStats {
            selected: batch.len(),
            ..IndexStats::default()
        };

        let mut ensured = BTreeSet::new();
        for pending in batch {
            let result = self
                .target_index(&connection, &mut ensured, &mut stats, pending.page_id)
                .and_then(|index| self.upsert(&connection, &index, &pending.document));
            match result {
                Ok(()) => stats.indexed += 1,
                Err(e) => {
                    stats.failed += 1;
                    stats.errors.push((pending.document.id, e.to_string()));
                }
            }
        }

        tracing::info!(
            selected = stats.selected,
            indexed = stats.indexed,
            failed = stats.failed,
            "indexing run finished"
        );
        Ok(stats)
    }

    /// Resolves the index of a page and creates it on first use in the run.
    ///
    /// Failures are reported to the sink. An index is remembered as ensured only once it
    /// exists.
    fn target_index(
        &self,
        connection: &Connection,
        ensured: &mut BTreeSet<String>,
        stats: &mut IndexStats,
        page_id: u64,
    ) -> Result<String, IndexError> {
        let index = self
            .store
            .root_for_page(page_id)
            .map(|root| connection.index_name(&self.options.base_name, root))
            .inspect_err(|e| self.sink.error(ORIGIN, &e.to_string()))?;
        if ensured.contains(&index) {
            return Ok(index);
        }

        let created = ensure_index(
            connection.backend(),
            &index,
            &self.options.analyzer,
            self.sink.as_ref(),
        )
        .inspect_err(|e| self.sink.error(ORIGIN, &e.to_string()))?;
        if created {
            tracing::info!(index = %index, "created index");
            stats.created_indices.push(index.clone());
        }
        ensured.insert(index.clone());
        Ok(index)
    }

    /// Deletes a record, its annotations and its backend document.
    ///
    /// Without a connection nothing is deleted. A backend failure is returned before the local
    /// cascade runs.
    pub fn delete(&mut self, id: u64) -> Result<DeleteOutcome, IndexError> {
        let Some(record) = self.store.find_record(id)? else {
            return Ok(DeleteOutcome::Missing);
        };
        let Some(connection) = self.connector.connect() else {
            return Ok(DeleteOutcome::Unavailable);
        };

        let root = self.store.root_for_page(record.page_id)?;
        let index = connection.index_name(&self.options.base_name, root);
        let remote = match delete_remote(connection.backend(), &index, id) {
            Ok(remote) => remote,
            Err(e) => {
                self.sink.error(DELETE_ORIGIN, &e.to_string());
                return Err(e);
            }
        };
        if remote {
            self.sink.debug(
                DELETE_ORIGIN,
                &format!("Index document with ID {id} was deleted."),
            );
        }

        for annotation in self.store.find_annotations(id)? {
            self.store.delete_annotation(annotation.id)?;
        }
        self.store.delete_record(id)?;
        Ok(DeleteOutcome::Deleted { remote })
    }
}

/// The query selecting every backend document of a record.
fn id_query(id: u64) -> Query {
    Query::Term(TermQuery::new("id", id))
}

/// Deletes any previous version of a document, then writes it.
fn write_document(
    connection: &Connection,
    index: &str,
    document: &Document,
) -> Result<(), IndexError> {
    let backend = connection.backend();
    let id = document.id.to_string();
    if backend.document_exists(index, &id)? {
        backend.delete_by_query(index, &id_query(document.id))?;
    }
    backend.index_document(index, &id, document)?;
    Ok(())
}

/// Deletes a record's backend document if there is one. Returns whether it existed.
fn delete_remote(
    backend: &dyn SearchBackend,
    index: &str,
    id: u64,
) -> Result<bool, IndexError> {
    if !backend.document_exists(index, &id.to_string())? {
        return Ok(false);
    }
    backend.delete_by_query(index, &id_query(id))?;
    Ok(true)
}

/// Advances a record's timestamp to now, and always past its previous value.
fn stamped(mut record: IndexRecord) -> IndexRecord {
    record.last_indexed = Utc::now().timestamp().max(record.last_indexed.saturating_add(1));
    record
}
