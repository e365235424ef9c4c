//! Compiles engine queries into tantivy queries.
//!
//! Bool clauses map onto a [`BooleanQuery`] with filters wrapped in a zero-score
//! [`ConstScoreQuery`]. A multi-field match becomes a [`DisjunctionMaxQuery`] over its boosted
//! fields, so a document scores by its best field. Phrase-prefix matches use
//! [`PhrasePrefixQuery`]; best-fields matches use a term or fuzzy term query per analyzed word.

use std::{collections::BTreeMap, str};

use serde_json::Value;
use tantivy::{
    Searcher, Term,
    query::{
        AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, DisjunctionMaxQuery, EmptyQuery,
        FuzzyTermQuery, Occur, PhrasePrefixQuery, Query as TantivyQuery,
        TermQuery as TantivyTermQuery, TermSetQuery,
    },
    schema::{Field, IndexRecordOption, Schema},
    tokenizer::Token,
};

use super::bad_request;
use crate::{
    analyzer::Pipeline,
    error::BackendError,
    query::{BoolQuery, Fuzziness, MatchType, MultiMatchQuery, PrefixQuery, Query, TermQuery},
};

/// Terms a trailing prefix may expand to in a phrase-prefix match.
pub(super) const MAX_EXPANSIONS: u32 = 50;

/// The text part of a multi-field match, kept for highlighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TextClause {
    /// Fields the match searched, without boosts.
    pub(super) fields: Vec<String>,
    /// Analyzed query words.
    pub(super) terms: Vec<String>,
    /// The last word matches as a prefix.
    pub(super) prefix: bool,
    /// Edits tolerated per word.
    pub(super) fuzziness: Option<Fuzziness>,
}

impl TextClause {
    /// Returns true if the clause searched `field`.
    pub(super) fn searches(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// A compiled request query.
pub(super) struct Compiled {
    /// The tantivy query.
    pub(super) query: Box<dyn TantivyQuery>,
    /// Text matches of scoring clauses, in request order.
    pub(super) text: Vec<TextClause>,
}

/// Splits `title^5` into a field name and a boost.
fn parse_field(boosted: &str) -> (&str, f32) {
    match boosted.split_once('^') {
        Some((name, boost)) => (name, boost.parse().unwrap_or(1.0)),
        None => (boosted, 1.0),
    }
}

/// Renders a term value the way it is indexed.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds a phrase-prefix query over `field`; offsets follow the token positions.
fn phrase_prefix(field: Field, tokens: &[Token]) -> Box<dyn TantivyQuery> {
    let first = tokens.first().map_or(0, |t| t.position);
    let terms = tokens
        .iter()
        .map(|t| {
            (
                t.position.saturating_sub(first),
                Term::from_field_text(field, &t.text),
            )
        })
        .collect();
    let mut query = PhrasePrefixQuery::new_with_offset(terms);
    query.set_max_expansions(MAX_EXPANSIONS);
    Box::new(query)
}

/// Builds a query matching any of the words in `field`, fuzzily when configured.
fn best_terms(
    field: Field,
    tokens: &[Token],
    fuzziness: Option<Fuzziness>,
) -> Box<dyn TantivyQuery> {
    let clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = tokens
        .iter()
        .map(|token| {
            let term = Term::from_field_text(field, &token.text);
            let distance = fuzziness.map_or(0, |f| f.max_distance(token.text.chars().count()));
            let query: Box<dyn TantivyQuery> = if distance > 0 {
                Box::new(FuzzyTermQuery::new(term, distance, true))
            } else {
                Box::new(TantivyTermQuery::new(term, IndexRecordOption::WithFreqs))
            };
            (Occur::Should, query)
        })
        .collect();
    Box::new(BooleanQuery::new(clauses))
}

/// Compiles queries against one index.
pub(super) struct Compiler<'a> {
    /// Schema of the index.
    schema: &'a Schema,
    /// Searcher used to resolve case-insensitive terms.
    searcher: &'a Searcher,
    /// Analyzers of the index, by name.
    analyzers: &'a mut BTreeMap<String, Pipeline>,
    /// Text clauses collected so far.
    text: Vec<TextClause>,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler.
    pub(super) fn new(
        schema: &'a Schema,
        searcher: &'a Searcher,
        analyzers: &'a mut BTreeMap<String, Pipeline>,
    ) -> Self {
        Self {
            schema,
            searcher,
            analyzers,
            text: Vec::new(),
        }
    }

    /// Compiles a request query.
    pub(super) fn compile(mut self, query: &Query) -> Result<Compiled, BackendError> {
        let query = self.query(query, true)?;
        Ok(Compiled {
            query,
            text: self.text,
        })
    }

    /// Compiles one clause. Text of non-scoring clauses is not kept.
    fn query(
        &mut self,
        query: &Query,
        scoring: bool,
    ) -> Result<Box<dyn TantivyQuery>, BackendError> {
        match query {
            Query::Bool(bool_query) => self.boolean(bool_query, scoring),
            Query::MultiMatch(multi) => self.multi_match(multi, scoring),
            Query::Term(term) => self.term(term),
            Query::Prefix(prefix) => Ok(self.prefix(prefix)),
        }
    }

    /// Compiles a bool query; one without clauses matches everything.
    fn boolean(
        &mut self,
        bool_query: &BoolQuery,
        scoring: bool,
    ) -> Result<Box<dyn TantivyQuery>, BackendError> {
        if bool_query.is_empty() {
            return Ok(Box::new(AllQuery));
        }

        let mut clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = Vec::new();
        for clause in &bool_query.must {
            clauses.push((Occur::Must, self.query(clause, scoring)?));
        }
        for clause in &bool_query.should {
            clauses.push((Occur::Should, self.query(clause, scoring)?));
        }
        for clause in &bool_query.filter {
            let filter = self.query(clause, false)?;
            clauses.push((Occur::Must, Box::new(ConstScoreQuery::new(filter, 0.0))));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    /// Compiles a multi-field match. Unmapped fields are skipped.
    fn multi_match(
        &mut self,
        multi: &MultiMatchQuery,
        scoring: bool,
    ) -> Result<Box<dyn TantivyQuery>, BackendError> {
        let pipeline = self.analyzers.get_mut(&multi.analyzer).ok_or_else(|| {
            bad_request(format!(
                "analyzer [{}] has not been configured",
                multi.analyzer
            ))
        })?;
        let tokens = pipeline.analyze(&multi.query);
        if tokens.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }

        let phrase = multi.kind == MatchType::PhrasePrefix;
        let mut disjuncts = Vec::new();
        let mut fields = Vec::new();
        for boosted in &multi.fields {
            let (name, boost) = parse_field(boosted);
            let Ok(field) = self.schema.get_field(name) else {
                continue;
            };
            let query = if phrase {
                phrase_prefix(field, &tokens)
            } else {
                best_terms(field, &tokens, multi.fuzziness)
            };
            disjuncts.push(Box::new(BoostQuery::new(query, boost)) as Box<dyn TantivyQuery>);
            fields.push(name.to_string());
        }
        if disjuncts.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }

        if scoring {
            self.text.push(TextClause {
                fields,
                terms: tokens.into_iter().map(|t| t.text).collect(),
                prefix: phrase,
                fuzziness: if phrase { None } else { multi.fuzziness },
            });
        }
        Ok(Box::new(DisjunctionMaxQuery::new(disjuncts)))
    }

    /// Compiles an exact value match. An unmapped field matches nothing.
    fn term(&self, term: &TermQuery) -> Result<Box<dyn TantivyQuery>, BackendError> {
        let Ok(field) = self.schema.get_field(&term.field) else {
            return Ok(Box::new(EmptyQuery));
        };
        let value = value_text(&term.value);
        if term.case_insensitive != Some(true) {
            let term = Term::from_field_text(field, &value);
            return Ok(Box::new(TantivyTermQuery::new(
                term,
                IndexRecordOption::Basic,
            )));
        }

        let terms = self.terms_ignoring_case(field, &value)?;
        if terms.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }
        Ok(Box::new(TermSetQuery::new(terms)))
    }

    /// Indexed terms of `field` equal to `value` ignoring ASCII case.
    fn terms_ignoring_case(&self, field: Field, value: &str) -> Result<Vec<Term>, BackendError> {
        let mut found = Vec::new();
        for segment in self.searcher.segment_readers() {
            let inverted = segment.inverted_index(field)?;
            let mut stream = inverted.terms().stream()?;
            while stream.advance() {
                if let Ok(key) = str::from_utf8(stream.key())
                    && key.eq_ignore_ascii_case(value)
                {
                    found.push(Term::from_field_text(field, key));
                }
            }
        }
        found.sort();
        found.dedup();
        Ok(found)
    }

    /// Compiles a term prefix match. An unmapped field matches nothing.
    fn prefix(&self, prefix: &PrefixQuery) -> Box<dyn TantivyQuery> {
        let Ok(field) = self.schema.get_field(&prefix.field) else {
            return Box::new(EmptyQuery);
        };
        let mut query = PhrasePrefixQuery::new(vec![Term::from_field_text(field, &prefix.value)]);
        query.set_max_expansions(u32::MAX);
        Box::new(query)
    }
}
