//! Mapping raw backend hits into search results.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::{response::RawHit, search::SearchOptions};

/// One search hit, ready for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Record identifier.
    pub id: u64,
    /// Highlighted fragments by field.
    pub highlight: BTreeMap<String, Vec<String>>,
    /// Content type labels.
    pub types: Vec<String>,
    /// Relevance score.
    pub score: f64,
    /// The options the search ran with.
    pub options: SearchOptions,
}

/// Reads a record identifier stored as a number or a numeric string.
fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Converts a raw hit. Hits without a usable record identifier are dropped.
pub fn map_hit(hit: RawHit, options: &SearchOptions) -> Option<SearchResult> {
    let id = hit.source.id.as_ref().and_then(parse_id)?;
    Some(SearchResult {
        id,
        highlight: hit.highlight,
        types: hit.source.types,
        score: hit.score.unwrap_or_default(),
        options: options.clone(),
    })
}
