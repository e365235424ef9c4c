//! An in-process search backend on top of RAM tantivy indices.
//!
//! Every index gets a tantivy schema derived from its definition, with the definition's own
//! analyzers registered as tokenizers. A [`MemoryBackend`] answers the engine's requests the
//! way a real cluster would for the supported request subset: term, prefix, multi-match
//! (phrase-prefix and best-fields with fuzziness) and bool queries, terms aggregations,
//! phrase suggestions and plain highlighting.

mod aggregate;
mod compile;
mod highlight;
mod suggest;

use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use regex::Regex;
use tantivy::{
    DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term,
    collector::{Count, TopDocs},
    query::{AllQuery, Query as TantivyQuery, TermQuery as TantivyTermQuery},
    schema::{
        Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
    },
    tokenizer::PreTokenizedString,
};

use self::{
    compile::{Compiled, Compiler, TextClause},
    highlight::Highlighter,
    suggest::Vocabulary,
};
use super::SearchBackend;
use crate::{
    analyzer::Pipeline,
    document::Document,
    error::BackendError,
    query::{Query, SearchRequest},
    response::{AggregationResult, HitSource, Hits, RawHit, SearchResponse},
    schema::{FieldType, IndexDefinition},
};

/// Field holding the backend id of a document.
const ID_FIELD: &str = "_id";

/// Field holding the document as indexed, serialized.
const SOURCE_FIELD: &str = "_source";

/// Memory budget of an index writer; the smallest tantivy accepts.
const WRITER_MEMORY: usize = 15_000_000;

/// How the values of a mapped field are indexed.
enum Indexing {
    /// Indexed as one untokenized term.
    Keyword,
    /// Tokenized by the registered analyzer.
    Text,
    /// Tokenized with shingles by the named pipeline.
    Shingled(String),
}

/// A mapped field of the tantivy schema.
struct MappedField {
    /// The schema field.
    field: Field,
    /// How values are indexed.
    indexing: Indexing,
}

/// Builds a client error in the backend's format.
fn bad_request(body: String) -> BackendError {
    BackendError::Status { status: 400, body }
}

/// Derives the tantivy schema of a definition.
///
/// Text fields without an analyzer are not indexed.
fn build_schema(
    definition: &IndexDefinition,
    analyzers: &BTreeMap<String, Pipeline>,
) -> (Schema, BTreeMap<String, MappedField>) {
    let mut builder = Schema::builder();
    let mut fields = BTreeMap::new();

    for (name, mapping) in &definition.mappings.properties {
        let mapped = match (mapping.kind, &mapping.analyzer) {
            (FieldType::Keyword, _) => MappedField {
                field: builder.add_text_field(name, STRING | STORED),
                indexing: Indexing::Keyword,
            },
            (FieldType::Text, Some(analyzer)) => {
                let shingled = analyzers.get(analyzer).is_some_and(Pipeline::has_shingles);
                let record = if shingled {
                    IndexRecordOption::WithFreqs
                } else {
                    IndexRecordOption::WithFreqsAndPositions
                };
                let options = TextOptions::default().set_indexing_options(
                    TextFieldIndexing::default()
                        .set_tokenizer(analyzer)
                        .set_index_option(record),
                );
                let options = if shingled { options } else { options.set_stored() };
                MappedField {
                    field: builder.add_text_field(name, options),
                    indexing: if shingled {
                        Indexing::Shingled(analyzer.clone())
                    } else {
                        Indexing::Text
                    },
                }
            }
            (FieldType::Text, None) => continue,
        };
        fields.insert(name.clone(), mapped);
    }

    if !fields.contains_key("id") {
        fields.insert("id".to_string(), MappedField {
            field: builder.add_text_field("id", STRING),
            indexing: Indexing::Keyword,
        });
    }
    builder.add_text_field(ID_FIELD, STRING | STORED);
    builder.add_text_field(SOURCE_FIELD, STORED);

    (builder.build(), fields)
}

/// Reads a stored string value.
fn stored_text(doc: &TantivyDocument, field: Field) -> Option<&str> {
    doc.get_first(field).and_then(|value| value.as_str())
}

/// One index: its definition, compiled analyzers and tantivy index.
struct MemoryIndex {
    /// Settings and mappings the index was created with.
    definition: IndexDefinition,
    /// Analyzers by name.
    analyzers: BTreeMap<String, Pipeline>,
    /// Mapped fields by name.
    fields: BTreeMap<String, MappedField>,
    /// The backend id field.
    id_field: Field,
    /// The serialized document field.
    source_field: Field,
    /// The RAM index.
    index: Index,
    /// Writer, committed after every change.
    writer: IndexWriter,
    /// Reader, reloaded after every commit.
    reader: IndexReader,
}

impl MemoryIndex {
    /// Compiles the analyzers of a definition, checks every mapped analyzer exists and
    /// creates the index.
    fn new(definition: IndexDefinition) -> Result<Self, BackendError> {
        let analysis = &definition.settings.analysis;
        let mut analyzers = BTreeMap::new();
        for (name, analyzer) in &analysis.analyzer {
            let pipeline = Pipeline::compile(analyzer, &analysis.filter)
                .map_err(|e| bad_request(format!("analyzer [{name}]: {e}")))?;
            analyzers.insert(name.clone(), pipeline);
        }
        for (field, mapping) in &definition.mappings.properties {
            if let Some(name) = &mapping.analyzer
                && !analyzers.contains_key(name)
            {
                return Err(bad_request(format!(
                    "analyzer [{name}] for field [{field}] has not been configured"
                )));
            }
        }

        let (schema, fields) = build_schema(&definition, &analyzers);
        let id_field = schema.get_field(ID_FIELD)?;
        let source_field = schema.get_field(SOURCE_FIELD)?;
        let index = Index::create_in_ram(schema);
        for (name, pipeline) in &analyzers {
            index.tokenizers().register(name, pipeline.text_analyzer());
        }
        let writer = index.writer_with_num_threads(1, WRITER_MEMORY)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            definition,
            analyzers,
            fields,
            id_field,
            source_field,
            index,
            writer,
            reader,
        })
    }

    /// Makes the changes of the writer visible to searches.
    fn commit(&mut self) -> Result<(), BackendError> {
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Builds the tantivy document for `document` according to the mappings.
    fn tantivy_document(
        &mut self,
        id: &str,
        document: &Document,
    ) -> Result<TantivyDocument, BackendError> {
        let mut values: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        values.insert("id", vec![document.id.to_string()]);
        values.insert("types", document.types.clone());
        for (name, mapping) in &self.definition.mappings.properties {
            if name == "id" || name == "types" {
                continue;
            }
            let Some(value) = document.field(name) else {
                continue;
            };
            values.entry(name.as_str()).or_default().push(value.to_string());
            if let Some(target) = &mapping.copy_to {
                values.entry(target.as_str()).or_default().push(value.to_string());
            }
        }

        let mut doc = TantivyDocument::new();
        for (name, texts) in values {
            let Some(mapped) = self.fields.get(name) else {
                continue;
            };
            for text in texts {
                match &mapped.indexing {
                    Indexing::Keyword | Indexing::Text => doc.add_text(mapped.field, text),
                    Indexing::Shingled(analyzer) => {
                        let Some(pipeline) = self.analyzers.get_mut(analyzer) else {
                            continue;
                        };
                        let tokens = pipeline.shingled(&text);
                        doc.add_pre_tokenized_text(mapped.field, PreTokenizedString {
                            text,
                            tokens,
                        });
                    }
                }
            }
        }
        doc.add_text(self.id_field, id);
        doc.add_text(
            self.source_field,
            serde_json::to_string(document).map_err(|e| BackendError::Engine(e.to_string()))?,
        );
        Ok(doc)
    }

    /// Indexes a document, replacing the one with the same id.
    fn index_document(&mut self, id: &str, document: &Document) -> Result<(), BackendError> {
        let doc = self.tantivy_document(id, document)?;
        self.writer
            .delete_term(Term::from_field_text(self.id_field, id));
        self.writer.add_document(doc)?;
        self.commit()
    }

    /// Deletes the documents matching `query` and returns how many there were.
    fn delete_by_query(&mut self, query: &Query) -> Result<u64, BackendError> {
        let searcher = self.reader.searcher();
        let schema = self.index.schema();
        let compiled = Compiler::new(&schema, &searcher, &mut self.analyzers).compile(query)?;
        let deleted = searcher.search(compiled.query.as_ref(), &Count)?;
        if deleted > 0 {
            self.writer.delete_query(compiled.query)?;
            self.commit()?;
        }
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }

    /// Finds the stored document with the given backend id.
    fn find(&self, id: &str) -> Result<Option<TantivyDocument>, BackendError> {
        let searcher = self.reader.searcher();
        let query = TantivyTermQuery::new(
            Term::from_field_text(self.id_field, id),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            Some((_, address)) => Ok(Some(searcher.doc(*address)?)),
            None => Ok(None),
        }
    }

    /// Returns the document as indexed.
    fn source(&self, doc: &TantivyDocument) -> Option<Document> {
        stored_text(doc, self.source_field).and_then(|json| serde_json::from_str(json).ok())
    }

    /// Runs a search request.
    fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        let searcher = self.reader.searcher();
        let schema = self.index.schema();
        let compiled = match &request.query {
            Some(query) => Compiler::new(&schema, &searcher, &mut self.analyzers).compile(query)?,
            None => Compiled {
                query: Box::new(AllQuery),
                text: Vec::new(),
            },
        };

        let limit = usize::try_from(searcher.num_docs())
            .unwrap_or(usize::MAX)
            .max(1);
        let top = searcher.search(compiled.query.as_ref(), &TopDocs::with_limit(limit))?;
        let mut matches = Vec::with_capacity(top.len());
        for (score, address) in top {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = stored_text(&doc, self.id_field).unwrap_or_default().to_string();
            matches.push((id, address, score, doc));
        }
        matches.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

        let mut aggregations = BTreeMap::new();
        if !request.aggs.is_empty() {
            let addresses: Vec<DocAddress> = matches.iter().map(|m| m.1).collect();
            for (name, aggregation) in &request.aggs {
                let terms = &aggregation.terms;
                let include = Regex::new(&format!("^(?:{})$", terms.include))
                    .map_err(|e| bad_request(format!("invalid include pattern: {e}")))?;
                let buckets = match self.fields.get(&terms.field) {
                    Some(mapped) => {
                        aggregate::terms_buckets(&searcher, mapped.field, &include, &addresses)?
                    }
                    None => Vec::new(),
                };
                aggregations.insert(name.clone(), AggregationResult { buckets });
            }
        }

        let mut highlighters = Vec::new();
        if let Some(settings) = &request.highlight {
            for name in settings.fields.keys() {
                let Some(mapped) = self.fields.get(name) else {
                    continue;
                };
                let clauses: Vec<&TextClause> = compiled
                    .text
                    .iter()
                    .filter(|clause| !settings.require_field_match || clause.searches(name))
                    .collect();
                if let Some(highlighter) =
                    Highlighter::new(&searcher, mapped.field, &clauses, settings)?
                {
                    highlighters.push((name, highlighter));
                }
            }
        }

        let mut hits = Vec::new();
        for (id, _, score, doc) in matches.into_iter().take(request.size) {
            let mut highlight = BTreeMap::new();
            for (name, highlighter) in &highlighters {
                let fragments = highlighter.fragments(&doc);
                if !fragments.is_empty() {
                    highlight.insert((*name).clone(), fragments);
                }
            }
            let source = self.source(&doc).unwrap_or_default();
            hits.push(RawHit {
                id: Some(id),
                score: Some(f64::from(score)),
                source: HitSource {
                    id: Some(source.id.into()),
                    types: source.types,
                },
                highlight,
            });
        }

        let mut suggest = BTreeMap::new();
        for (name, suggestion) in &request.suggest {
            let entries = match self.fields.get(&suggestion.phrase.field) {
                Some(mapped) => suggest::phrase(
                    &suggestion.text,
                    &Vocabulary::new(&searcher, mapped.field),
                    &suggestion.phrase,
                )?,
                None => Vec::new(),
            };
            suggest.insert(name.clone(), entries);
        }

        Ok(SearchResponse {
            hits: Hits { hits },
            aggregations,
            suggest,
        })
    }

    /// The searcher over the last commit.
    fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }
}

/// An in-memory [`SearchBackend`].
#[derive(Default)]
pub struct MemoryBackend {
    /// Indices by name.
    indices: Mutex<BTreeMap<String, MemoryIndex>>,
}

impl MemoryBackend {
    /// Creates a backend without indices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on the locked index map.
    fn with_indices<T>(&self, f: impl FnOnce(&mut BTreeMap<String, MemoryIndex>) -> T) -> T {
        let mut indices = self.indices.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut indices)
    }

    /// Runs `f` on one index, failing if it does not exist.
    fn with_index<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MemoryIndex) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        self.with_indices(|indices| match indices.get_mut(name) {
            Some(index) => f(index),
            None => Err(BackendError::MissingIndex(name.to_string())),
        })
    }

    /// Names of all indices.
    pub fn index_names(&self) -> Vec<String> {
        self.with_indices(|indices| indices.keys().cloned().collect())
    }

    /// The definition an index was created with.
    pub fn definition(&self, index: &str) -> Option<IndexDefinition> {
        self.with_indices(|indices| indices.get(index).map(|i| i.definition.clone()))
    }

    /// Returns a stored document.
    pub fn document(&self, index: &str, id: &str) -> Option<Document> {
        self.with_indices(|indices| {
            let index = indices.get(index)?;
            let doc = index.find(id).ok()??;
            index.source(&doc)
        })
    }

    /// Number of documents in an index; 0 for a missing index.
    pub fn document_count(&self, index: &str) -> usize {
        self.with_indices(|indices| {
            indices.get(index).map_or(0, |i| {
                usize::try_from(i.searcher().num_docs()).unwrap_or(usize::MAX)
            })
        })
    }

    /// Removes an index with all its documents. Returns false if it did not exist.
    pub fn drop_index(&self, index: &str) -> bool {
        self.with_indices(|indices| indices.remove(index).is_some())
    }
}

impl SearchBackend for MemoryBackend {
    fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        Ok(self.with_indices(|indices| indices.contains_key(index)))
    }

    fn create_index(
        &self,
        index: &str,
        definition: &IndexDefinition,
    ) -> Result<(), BackendError> {
        self.with_indices(|indices| {
            if indices.contains_key(index) {
                return Err(BackendError::IndexExists(index.to_string()));
            }
            indices.insert(index.to_string(), MemoryIndex::new(definition.clone())?);
            Ok(())
        })
    }

    fn document_exists(&self, index: &str, id: &str) -> Result<bool, BackendError> {
        self.with_indices(|indices| match indices.get(index) {
            Some(index) => Ok(index.find(id)?.is_some()),
            None => Ok(false),
        })
    }

    fn delete_by_query(&self, index: &str, query: &Query) -> Result<u64, BackendError> {
        self.with_index(index, |index| index.delete_by_query(query))
    }

    fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), BackendError> {
        self.with_index(index, |index| index.index_document(id, document))
    }

    fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, BackendError> {
        self.with_index(index, |index| index.search(request))
    }
}
