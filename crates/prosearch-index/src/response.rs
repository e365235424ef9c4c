//! Typed search responses.
//!
//! Only the parts the engine reads are modeled; every section defaults to empty so partial
//! responses deserialize.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A search response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matching documents.
    #[serde(default)]
    pub hits: Hits,
    /// Aggregation results by name.
    #[serde(default)]
    pub aggregations: BTreeMap<String, AggregationResult>,
    /// Suggestion results by name.
    #[serde(default)]
    pub suggest: BTreeMap<String, Vec<SuggestEntry>>,
}

impl SearchResponse {
    /// Returns the option texts of a named suggestion, in response order.
    pub fn suggestions(&self, name: &str) -> Vec<String> {
        self.suggest
            .get(name)
            .into_iter()
            .flatten()
            .flat_map(|entry| entry.options.iter().map(|o| o.text.clone()))
            .collect()
    }

    /// Returns the bucket keys of a named terms aggregation, in response order.
    pub fn bucket_keys(&self, name: &str) -> Vec<String> {
        self.aggregations
            .get(name)
            .map(|agg| agg.buckets.iter().map(|b| b.key.clone()).collect())
            .unwrap_or_default()
    }
}

/// The hits section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hits {
    /// Hits, best first.
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

/// One matching document as returned by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawHit {
    /// Backend document id.
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Relevance score; absent for unscored hits.
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    /// Stored document fields.
    #[serde(rename = "_source", default)]
    pub source: HitSource,
    /// Highlight fragments by field.
    #[serde(default)]
    pub highlight: BTreeMap<String, Vec<String>>,
}

/// The stored fields the engine reads back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HitSource {
    /// Record identifier, a number or a numeric string.
    #[serde(default)]
    pub id: Option<Value>,
    /// Content type labels.
    #[serde(default)]
    pub types: Vec<String>,
}

/// A terms aggregation result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Buckets in requested order.
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

/// One aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// The term.
    pub key: String,
    /// Documents containing the term.
    pub doc_count: u64,
}

/// Suggestions for one span of the input text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuggestEntry {
    /// The input text.
    #[serde(default)]
    pub text: String,
    /// Corrections, best first.
    #[serde(default)]
    pub options: Vec<SuggestOption>,
}

/// One suggested correction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuggestOption {
    /// Corrected text.
    pub text: String,
    /// Corrected text with the changed terms marked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<String>,
    /// Suggestion score.
    #[serde(default)]
    pub score: f64,
}
