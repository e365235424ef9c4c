//! The search backend capability interface and its adapters.
//!
//! The engine talks to a backend only through [`SearchBackend`]. [`HttpBackend`] speaks the
//! Elasticsearch REST API for direct and cloud deployments; [`MemoryBackend`] evaluates the
//! same requests in-process.

mod http;
mod memory;

pub use http::{HttpBackend, HttpSettings, decode_cloud_id};
pub use memory::MemoryBackend;

use crate::{
    document::Document, error::BackendError, query::Query, query::SearchRequest,
    response::SearchResponse, schema::IndexDefinition,
};

/// Index management and query operations of a search backend.
///
/// All calls block until the backend answered. Writes are visible to subsequent searches.
pub trait SearchBackend: Send + Sync {
    /// Returns true if the index exists.
    fn index_exists(&self, index: &str) -> Result<bool, BackendError>;

    /// Creates an index with the given settings and mappings.
    ///
    /// Fails with [`BackendError::IndexExists`] if the index is already present.
    fn create_index(&self, index: &str, definition: &IndexDefinition)
    -> Result<(), BackendError>;

    /// Returns true if a document with the backend id `id` exists in the index.
    fn document_exists(&self, index: &str, id: &str) -> Result<bool, BackendError>;

    /// Deletes every document matching `query` and returns how many were deleted.
    fn delete_by_query(&self, index: &str, query: &Query) -> Result<u64, BackendError>;

    /// Stores `document` under the backend id `id`, replacing any previous version.
    fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), BackendError>;

    /// Runs a search request.
    fn search(&self, index: &str, request: &SearchRequest)
    -> Result<SearchResponse, BackendError>;
}
