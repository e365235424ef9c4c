//! Flattening index records into searchable documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    IndexError,
    store::{IndexRecord, MicrodataAnnotation, RecordStore},
};

/// Document keys owned by the record itself; payload entries with these names are ignored.
const RESERVED_KEYS: [&str; 7] = [
    "id",
    "title",
    "description",
    "url",
    "domain",
    "language",
    "types",
];

/// An index-ready document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Record identifier.
    pub id: u64,
    /// Page title.
    pub title: String,
    /// Page description.
    pub description: String,
    /// Canonical URL.
    pub url: String,
    /// Host name.
    pub domain: String,
    /// Language code.
    pub language: String,
    /// Content type labels, without duplicates.
    pub types: Vec<String>,
    /// Additional text fields such as `text`, `h1` or `strong`.
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Document {
    /// Returns the value of a named field, including the fixed text fields.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "description" => Some(&self.description),
            "url" => Some(&self.url),
            "domain" => Some(&self.domain),
            "language" => Some(&self.language),
            other => self.fields.get(other).map(String::as_str),
        }
    }
}

/// Renders a payload value as field text.
///
/// Strings are kept, numbers and booleans are written out and lists are flattened with
/// `", "`. Nulls and objects have no text.
fn field_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(field_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

/// Parses the serialized document payload.
///
/// Entries are parsed one by one, so an entry without text only drops itself. Absent or
/// malformed payloads yield no fields.
pub fn parse_fields(payload: &str) -> BTreeMap<String, String> {
    if payload.trim().is_empty() {
        return BTreeMap::new();
    }
    let Ok(entries) = serde_json::from_str::<BTreeMap<String, Value>>(payload) else {
        return BTreeMap::new();
    };
    entries
        .into_iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| field_text(value).map(|text| (key, text)))
        .collect()
}

/// Parses the serialized type list. Absent or malformed lists yield no types.
pub fn parse_types(payload: &str) -> Vec<String> {
    if payload.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(payload).unwrap_or_default()
}

/// Builds the document for a record and its annotations.
///
/// Annotation types are appended to the record's types; duplicates are dropped and the
/// first occurrence keeps its position.
pub fn build(record: &IndexRecord, annotations: &[MicrodataAnnotation]) -> Document {
    let mut types: Vec<String> = Vec::new();
    let candidates = parse_types(&record.types)
        .into_iter()
        .chain(annotations.iter().map(|a| a.kind.clone()));
    for kind in candidates {
        if !types.contains(&kind) {
            types.push(kind);
        }
    }

    Document {
        id: record.id,
        title: record.title.clone(),
        description: record.description.clone(),
        url: record.url.clone(),
        domain: record.domain.clone(),
        language: record.language.clone(),
        types,
        fields: parse_fields(&record.document),
    }
}

/// Loads a record and its annotations from the store and builds its document.
pub fn build_document(store: &dyn RecordStore, id: u64) -> Result<Document, IndexError> {
    let record = store.find_record(id)?.ok_or(IndexError::NotFound { id })?;
    let annotations = store.find_annotations(id)?;
    Ok(build(&record, &annotations))
}
