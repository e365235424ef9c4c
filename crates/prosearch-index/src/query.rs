//! Typed search requests and the builders for the search and autocomplete requests.
//!
//! Every type serializes to the backend's JSON query language. Requests are plain data: the
//! HTTP adapter sends them as-is and the in-memory backend interprets them.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::Value;

use crate::{
    IndexError,
    analyzer::AUTOCOMPLETE,
    search::{SearchOptions, SearchQuery},
};

/// Fields every query term must match in.
pub const MUST_FIELDS: [&str; 4] = ["title", "description", "text", "document"];

/// Boosted fields that raise the score of a match.
pub const SHOULD_FIELDS: [&str; 8] = ["title^5", "h1^10", "strong", "h2^2", "h3", "h4", "h5", "h6"];

/// Fields highlight fragments are produced for.
pub const HIGHLIGHT_FIELDS: [&str; 2] = ["text", "document"];

/// Name of the phrase suggestion in requests and responses.
pub const DID_YOU_MEAN: &str = "didYouMean";

/// Maximum characters per highlight fragment.
pub const FRAGMENT_SIZE: usize = 150;

/// Maximum highlight fragments per field.
pub const NUMBER_OF_FRAGMENTS: usize = 3;

/// A query clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Boolean combination of clauses.
    Bool(BoolQuery),
    /// Full-text match over several fields.
    MultiMatch(MultiMatchQuery),
    /// Exact value match.
    Term(TermQuery),
    /// Term prefix match.
    Prefix(PrefixQuery),
}

/// Boolean combination of clauses.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BoolQuery {
    /// Clauses that must match and contribute to the score.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Query>,
    /// Clauses that raise the score when they match.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Query>,
    /// Clauses that must match without scoring.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Query>,
}

impl BoolQuery {
    /// Returns true if the query has no clauses.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.filter.is_empty()
    }
}

/// How a multi-field match is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Terms in sequence, the last one as a prefix.
    PhrasePrefix,
    /// Any term, scored by the best matching field.
    BestFields,
}

/// Edit distance tolerated per term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fuzziness {
    /// Scaled with the term length.
    #[serde(rename = "AUTO")]
    Auto,
}

impl Fuzziness {
    /// Maximum edits for a term of `len` characters.
    pub fn max_distance(self, len: usize) -> u8 {
        match len {
            0..=2 => 0,
            3..=5 => 1,
            _ => 2,
        }
    }
}

/// Full-text match over several fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiMatchQuery {
    /// The user's query text.
    pub query: String,
    /// Analyzer applied to the query text.
    pub analyzer: String,
    /// Scoring mode.
    #[serde(rename = "type")]
    pub kind: MatchType,
    /// Fields, optionally suffixed with `^boost`.
    pub fields: Vec<String>,
    /// Edit tolerance, for best-fields matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<Fuzziness>,
}

impl MultiMatchQuery {
    /// Builds a strict or fuzzy match of `query` over `fields`.
    fn new(query: &str, analyzer: &str, fields: &[&str], fuzzy: bool) -> Self {
        Self {
            query: query.to_string(),
            analyzer: analyzer.to_string(),
            kind: if fuzzy {
                MatchType::BestFields
            } else {
                MatchType::PhrasePrefix
            },
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            fuzziness: fuzzy.then_some(Fuzziness::Auto),
        }
    }
}

/// Exact value match on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    /// Field name.
    pub field: String,
    /// Value to match.
    pub value: Value,
    /// Explicit case sensitivity, sent in the expanded form.
    pub case_insensitive: Option<bool>,
}

impl TermQuery {
    /// A term query in the short `{field: value}` form.
    pub fn new(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
            case_insensitive: None,
        }
    }

    /// A case-sensitive term query.
    pub fn case_sensitive(field: &str, value: impl Into<Value>) -> Self {
        Self {
            case_insensitive: Some(false),
            ..Self::new(field, value)
        }
    }
}

impl Serialize for TermQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        /// The expanded `{value, case_insensitive}` form.
        #[derive(Serialize)]
        struct Expanded<'a> {
            /// Value to match.
            value: &'a Value,
            /// Case sensitivity flag.
            case_insensitive: bool,
        }

        let mut map = serializer.serialize_map(Some(1))?;
        match self.case_insensitive {
            Some(case_insensitive) => map.serialize_entry(&self.field, &Expanded {
                value: &self.value,
                case_insensitive,
            })?,
            None => map.serialize_entry(&self.field, &self.value)?,
        }
        map.end()
    }
}

/// Prefix match on the terms of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixQuery {
    /// Field name.
    pub field: String,
    /// Term prefix.
    pub value: String,
}

impl Serialize for PrefixQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut inner = BTreeMap::new();
        inner.insert("value", &self.value);
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &inner)?;
        map.end()
    }
}

/// Per-field highlight options. No options are set; the field is highlighted with the
/// request-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HighlightField {}

/// Highlighting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlight {
    /// Inserted before each match.
    pub pre_tags: Vec<String>,
    /// Inserted after each match.
    pub post_tags: Vec<String>,
    /// Highlighted fields.
    pub fields: BTreeMap<String, HighlightField>,
    /// Only highlight fields the query matched in.
    pub require_field_match: bool,
    /// Highlighter implementation.
    #[serde(rename = "type")]
    pub kind: String,
    /// Maximum characters per fragment.
    pub fragment_size: usize,
    /// Maximum fragments per field.
    pub number_of_fragments: usize,
    /// Fragment boundary strategy.
    pub fragmenter: String,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            pre_tags: vec!["<strong>".to_string()],
            post_tags: vec!["</strong>".to_string()],
            fields: HIGHLIGHT_FIELDS
                .iter()
                .map(|f| ((*f).to_string(), HighlightField::default()))
                .collect(),
            require_field_match: true,
            kind: "plain".to_string(),
            fragment_size: FRAGMENT_SIZE,
            number_of_fragments: NUMBER_OF_FRAGMENTS,
            fragmenter: "span".to_string(),
        }
    }
}

/// Bucket order of a terms aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Largest first.
    Desc,
}

/// Buckets the terms of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermsAggregation {
    /// Aggregated field.
    pub field: String,
    /// Bucket ordering, e.g. `{"_count": "desc"}`.
    pub order: BTreeMap<String, SortOrder>,
    /// Regular expression terms must match.
    pub include: String,
}

/// An aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    /// Terms aggregation.
    pub terms: TermsAggregation,
}

/// Candidate generator for a phrase suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectGenerator {
    /// Field candidates are drawn from.
    pub field: String,
    /// When to suggest.
    pub suggest_mode: String,
}

/// Markup around corrected terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestHighlight {
    /// Inserted before a correction.
    pub pre_tag: String,
    /// Inserted after a correction.
    pub post_tag: String,
}

/// Phrase suggestion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhraseSuggester {
    /// Field the phrase is checked against.
    pub field: String,
    /// Maximum corrections returned.
    pub size: usize,
    /// Largest shingle in the field.
    pub gram_size: usize,
    /// Analyzer for the input text.
    pub analyzer: String,
    /// Candidate generators.
    pub direct_generator: Vec<DirectGenerator>,
    /// Correction markup.
    pub highlight: SuggestHighlight,
}

/// A named suggestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Input text.
    pub text: String,
    /// Phrase suggester.
    pub phrase: PhraseSuggester,
}

impl Suggestion {
    /// The did-you-mean suggestion for `text`.
    pub fn did_you_mean(text: &str, analyzer: &str) -> Self {
        Self {
            text: text.to_string(),
            phrase: PhraseSuggester {
                field: AUTOCOMPLETE.to_string(),
                size: 1,
                gram_size: 3,
                analyzer: analyzer.to_string(),
                direct_generator: vec![DirectGenerator {
                    field: AUTOCOMPLETE.to_string(),
                    suggest_mode: "always".to_string(),
                }],
                highlight: SuggestHighlight {
                    pre_tag: "<em>".to_string(),
                    post_tag: "</em>".to_string(),
                },
            },
        }
    }
}

/// A search request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Maximum hits returned.
    pub size: usize,
    /// Query clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    /// Highlighting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,
    /// Aggregations by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, Aggregation>,
    /// Suggestions by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub suggest: BTreeMap<String, Suggestion>,
}

/// Builds the full-text search request.
///
/// With `fuzzy`, both match clauses use best-fields scoring with automatic fuzziness.
/// The language and domain filters are always applied, empty values included. Returns
/// [`IndexError::EmptyQuery`] when there is neither query text nor a type filter.
pub fn build_search_request(
    query: &SearchQuery,
    options: &SearchOptions,
    fuzzy: bool,
) -> Result<SearchRequest, IndexError> {
    let text = query.query.trim();
    let mut clauses = BoolQuery::default();

    if !text.is_empty() {
        clauses.must.push(Query::MultiMatch(MultiMatchQuery::new(
            text,
            &options.analyzer,
            &MUST_FIELDS,
            fuzzy,
        )));
        clauses.should.push(Query::MultiMatch(MultiMatchQuery::new(
            text,
            &options.analyzer,
            &SHOULD_FIELDS,
            fuzzy,
        )));
    }
    if text.is_empty() && query.types.is_empty() {
        return Err(IndexError::EmptyQuery);
    }
    clauses
        .filter
        .push(Query::Term(TermQuery::new("language", options.language.as_str())));
    clauses
        .filter
        .push(Query::Term(TermQuery::new("domain", options.domain.as_str())));
    for kind in &query.types {
        clauses
            .filter
            .push(Query::Term(TermQuery::case_sensitive("types", kind.as_str())));
    }

    let mut suggest = BTreeMap::new();
    suggest.insert(
        DID_YOU_MEAN.to_string(),
        Suggestion::did_you_mean(text, &options.analyzer),
    );

    Ok(SearchRequest {
        size: options.per_page,
        query: Some(Query::Bool(clauses)),
        highlight: Some(Highlight::default()),
        aggs: BTreeMap::new(),
        suggest,
    })
}

/// Builds the autocomplete request for a typed prefix.
///
/// The request returns no hits; completions come from a terms aggregation over the
/// autocomplete field. Returns [`IndexError::EmptyQuery`] for a blank prefix.
pub fn build_autocomplete_request(
    prefix: &str,
    analyzer: &str,
) -> Result<SearchRequest, IndexError> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(IndexError::EmptyQuery);
    }
    let lowered = prefix.to_lowercase();

    let mut order = BTreeMap::new();
    order.insert("_count".to_string(), SortOrder::Desc);
    let mut aggs = BTreeMap::new();
    aggs.insert(AUTOCOMPLETE.to_string(), Aggregation {
        terms: TermsAggregation {
            field: AUTOCOMPLETE.to_string(),
            order,
            include: format!("{}.*", regex::escape(&lowered)),
        },
    });

    let mut suggest = BTreeMap::new();
    suggest.insert(
        DID_YOU_MEAN.to_string(),
        Suggestion::did_you_mean(prefix, analyzer),
    );

    Ok(SearchRequest {
        size: 0,
        query: Some(Query::Prefix(PrefixQuery {
            field: AUTOCOMPLETE.to_string(),
            value: lowered,
        })),
        highlight: None,
        aggs,
        suggest,
    })
}
