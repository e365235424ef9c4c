//! Index naming and the index definition (analysis settings plus field mappings).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    IndexError,
    analyzer::{AUTOCOMPLETE, Analysis, AnalyzerSet},
    backend::SearchBackend,
    error::BackendError,
    sink::EventSink,
};

/// Text fields copied into the autocomplete field.
pub const AUTOCOMPLETE_SOURCES: [&str; 3] = ["title", "description", "text"];

/// Analyzed text fields that are not copied into the autocomplete field.
pub const TEXT_FIELDS: [&str; 8] = ["document", "h1", "h2", "h3", "h4", "h5", "h6", "strong"];

/// Exact-match fields.
pub const KEYWORD_FIELDS: [&str; 4] = ["language", "domain", "url", "types"];

/// Derives the index name for a tenant and optional site root.
///
/// The result is `{base}_{signature}` or `{base}_{signature}_{root}`.
pub fn index_name(base: &str, signature: &str, root_id: Option<u64>) -> String {
    match root_id {
        Some(root) => format!("{base}_{signature}_{root}"),
        None => format!("{base}_{signature}"),
    }
}

/// Mapping type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Analyzed full text.
    Text,
    /// Exact, non-analyzed value.
    Keyword,
}

/// Mapping of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field type.
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// Analyzer for text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    /// Whether terms can be aggregated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fielddata: Option<bool>,
    /// Field the value is also indexed into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_to: Option<String>,
}

impl FieldMapping {
    /// An analyzed text field.
    fn text(analyzer: &str) -> Self {
        Self {
            kind: FieldType::Text,
            analyzer: Some(analyzer.to_string()),
            fielddata: None,
            copy_to: None,
        }
    }

    /// An exact-match field.
    fn keyword() -> Self {
        Self {
            kind: FieldType::Keyword,
            analyzer: None,
            fielddata: None,
            copy_to: None,
        }
    }
}

/// Index settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Analyzers and token filters.
    pub analysis: Analysis,
}

/// Field mappings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mappings {
    /// Mapped fields by name.
    pub properties: BTreeMap<String, FieldMapping>,
}

/// The body sent when creating an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index settings.
    pub settings: IndexSettings,
    /// Field mappings.
    pub mappings: Mappings,
}

/// Builds the definition of an index whose text fields use `analyzer`.
pub fn index_definition(analyzer: &str) -> Result<IndexDefinition, IndexError> {
    if !AnalyzerSet::is_base(analyzer) {
        return Err(IndexError::InvalidAnalyzer(analyzer.to_string()));
    }

    let mut properties = BTreeMap::new();
    properties.insert(AUTOCOMPLETE.to_string(), FieldMapping {
        fielddata: Some(true),
        ..FieldMapping::text(AUTOCOMPLETE)
    });
    for field in AUTOCOMPLETE_SOURCES {
        properties.insert(field.to_string(), FieldMapping {
            copy_to: Some(AUTOCOMPLETE.to_string()),
            ..FieldMapping::text(analyzer)
        });
    }
    for field in TEXT_FIELDS {
        properties.insert(field.to_string(), FieldMapping::text(analyzer));
    }
    for field in KEYWORD_FIELDS {
        properties.insert(field.to_string(), FieldMapping::keyword());
    }

    Ok(IndexDefinition {
        settings: IndexSettings {
            analysis: AnalyzerSet::analysis(),
        },
        mappings: Mappings { properties },
    })
}

/// Creates the index `name` unless it already exists.
///
/// Returns true if the index was created. An existing index is never altered.
pub fn ensure_index(
    backend: &dyn SearchBackend,
    name: &str,
    analyzer: &str,
    sink: &dyn EventSink,
) -> Result<bool, IndexError> {
    if backend.index_exists(name)? {
        return Ok(false);
    }

    let definition = index_definition(analyzer)?;
    match backend.create_index(name, &definition) {
        Ok(()) => {
            sink.debug(
                "schema::ensure_index",
                &format!("Mapping for Index {name} was created."),
            );
            Ok(true)
        }
        // Created concurrently between the existence check and the create call.
        Err(BackendError::IndexExists(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
