//! Persistent storage of index records and their microdata annotations.
//!
//! The engine reads and writes records only through the [`RecordStore`] trait. The
//! [`MemoryRecordStore`] keeps everything in memory and can be loaded from and saved to a
//! JSON file.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::IndexError;

/// Whether a record takes part in indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordState {
    /// Eligible for indexing.
    #[default]
    Active,
    /// Skipped by indexing runs.
    Inactive,
}

/// One crawled page, as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Record identifier; also the document identifier in the backend.
    pub id: u64,
    /// The page the record was crawled from.
    pub page_id: u64,
    /// Canonical URL.
    pub url: String,
    /// Host name.
    pub domain: String,
    /// Language code.
    pub language: String,
    /// Page title.
    pub title: String,
    /// Page description.
    pub description: String,
    /// JSON object of additional text fields.
    #[serde(default)]
    pub document: String,
    /// JSON array of content type labels.
    #[serde(default)]
    pub types: String,
    /// Indexing state.
    #[serde(default)]
    pub state: RecordState,
    /// Unix time of the last successful indexing, 0 when never indexed.
    #[serde(default)]
    pub last_indexed: i64,
}

/// A structured-data annotation attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrodataAnnotation {
    /// Annotation identifier.
    pub id: u64,
    /// The record the annotation belongs to.
    pub record_id: u64,
    /// Schema type, e.g. `Event` or `Product`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Selects records from a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only records in this state.
    pub state: Option<RecordState>,
    /// Only the record with this id.
    pub id: Option<u64>,
}

impl RecordFilter {
    /// Active records, optionally restricted to one id.
    pub fn active(id: Option<u64>) -> Self {
        Self {
            state: Some(RecordState::Active),
            id,
        }
    }

    /// Returns true if `record` passes the filter.
    pub fn matches(&self, record: &IndexRecord) -> bool {
        self.state.is_none_or(|state| record.state == state)
            && self.id.is_none_or(|id| record.id == id)
    }
}

/// Access to records, annotations and the page tree.
pub trait RecordStore {
    /// Looks up a record by id.
    fn find_record(&self, id: u64) -> Result<Option<IndexRecord>, IndexError>;

    /// Returns up to `limit` records matching `filter`, least recently indexed first.
    fn find_records(
        &self,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<IndexRecord>, IndexError>;

    /// Returns the annotations attached to a record.
    fn find_annotations(&self, record_id: u64) -> Result<Vec<MicrodataAnnotation>, IndexError>;

    /// Deletes a record. Deleting an absent record is not an error.
    fn delete_record(&mut self, id: u64) -> Result<(), IndexError>;

    /// Deletes an annotation.
    fn delete_annotation(&mut self, id: u64) -> Result<(), IndexError>;

    /// Inserts or replaces a record.
    fn save_record(&mut self, record: &IndexRecord) -> Result<(), IndexError>;

    /// Resolves the site root of a page, if the page is known.
    fn root_for_page(&self, page_id: u64) -> Result<Option<u64>, IndexError>;
}

/// Serialized form of a [`MemoryRecordStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    /// All records.
    #[serde(default)]
    records: Vec<IndexRecord>,
    /// All annotations.
    #[serde(default)]
    annotations: Vec<MicrodataAnnotation>,
    /// Page id to site root id.
    #[serde(default)]
    pages: HashMap<u64, u64>,
}

/// An in-memory record store with JSON persistence.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    /// Records by id.
    records: BTreeMap<u64, IndexRecord>,
    /// Annotations by id.
    annotations: BTreeMap<u64, MicrodataAnnotation>,
    /// Page id to site root id.
    pages: HashMap<u64, u64>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a JSON file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let file: StoreFile = serde_json::from_str(&content)
            .map_err(|e| IndexError::Store(format!("{}: {e}", path.display())))?;

        Ok(Self {
            records: file.records.into_iter().map(|r| (r.id, r)).collect(),
            annotations: file.annotations.into_iter().map(|a| (a.id, a)).collect(),
            pages: file.pages,
        })
    }

    /// Writes the store to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let file = StoreFile {
            records: self.records.values().cloned().collect(),
            annotations: self.annotations.values().cloned().collect(),
            pages: self.pages.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| IndexError::Store(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Adds an annotation.
    pub fn add_annotation(&mut self, annotation: MicrodataAnnotation) {
        self.annotations.insert(annotation.id, annotation);
    }

    /// Places a page under a site root.
    pub fn set_root(&mut self, page_id: u64, root_id: u64) {
        self.pages.insert(page_id, root_id);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of stored annotations.
    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }
}

impl RecordStore for MemoryRecordStore {
    fn find_record(&self, id: u64) -> Result<Option<IndexRecord>, IndexError> {
        Ok(self.records.get(&id).cloned())
    }

    fn find_records(
        &self,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<IndexRecord>, IndexError> {
        let mut records: Vec<IndexRecord> = self
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.last_indexed, r.id));
        records.truncate(limit);
        Ok(records)
    }

    fn find_annotations(&self, record_id: u64) -> Result<Vec<MicrodataAnnotation>, IndexError> {
        Ok(self
            .annotations
            .values()
            .filter(|a| a.record_id == record_id)
            .cloned()
            .collect())
    }

    fn delete_record(&mut self, id: u64) -> Result<(), IndexError> {
        self.records.remove(&id);
        Ok(())
    }

    fn delete_annotation(&mut self, id: u64) -> Result<(), IndexError> {
        self.annotations.remove(&id);
        Ok(())
    }

    fn save_record(&mut self, record: &IndexRecord) -> Result<(), IndexError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn root_for_page(&self, page_id: u64) -> Result<Option<u64>, IndexError> {
        Ok(self.pages.get(&page_id).copied())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Creates an active, never indexed record with predictable content.
    pub fn record(id: u64, url: &str) -> IndexRecord {
        IndexRecord {
            id,
            page_id: id * 10,
            url: url.to_string(),
            domain: "example.org".to_string(),
            language: "en".to_string(),
            title: format!("Title {id}"),
            description: format!("Description {id}"),
            document: String::new(),
            types: String::new(),
            state: RecordState::Active,
            last_indexed: 0,
        }
    }
}
