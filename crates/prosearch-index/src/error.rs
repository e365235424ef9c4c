//! Error types for the prosearch-index crate.

use std::io;

use tantivy::TantivyError;
use thiserror::Error;

/// Errors returned by the indexing and query engine.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No usable backend connection (credentials missing, invalid, or license-only).
    #[error("no connection to the search backend could be established")]
    Unavailable,

    /// A referenced record does not exist.
    #[error("record {id} not found")]
    NotFound {
        /// Identifier of the missing record.
        id: u64,
    },

    /// The search backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The request body would be empty, so no query was sent.
    #[error("query is empty")]
    EmptyQuery,

    /// Unknown analyzer or stemmer language.
    #[error("unsupported analyzer: {0}")]
    InvalidAnalyzer(String),

    /// The record store failed.
    #[error("record store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by a search backend adapter.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// A request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The addressed index does not exist.
    #[error("no such index: {0}")]
    MissingIndex(String),

    /// The index to be created already exists.
    #[error("index already exists: {0}")]
    IndexExists(String),

    /// The adapter could not be constructed from its settings.
    #[error("invalid backend configuration: {0}")]
    Configuration(String),

    /// The embedded search engine failed.
    #[error("search engine error: {0}")]
    Engine(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(source: reqwest::Error) -> Self {
        Self::Transport(source.to_string())
    }
}

impl From<TantivyError> for BackendError {
    fn from(source: TantivyError) -> Self {
        Self::Engine(source.to_string())
    }
}

impl From<io::Error> for BackendError {
    fn from(source: io::Error) -> Self {
        Self::Engine(source.to_string())
    }
}
