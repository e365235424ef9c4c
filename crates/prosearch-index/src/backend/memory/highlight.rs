//! Plain highlighting: the best fragment of a stored field with matched words wrapped in tags.

use std::{collections::BTreeSet, str};

use levenshtein_automata::LevenshteinAutomatonBuilder;
use tantivy::{
    Searcher, TantivyDocument, Term,
    query::{BooleanQuery, BoostQuery, Occur, Query as TantivyQuery, TermQuery},
    schema::{Field, IndexRecordOption},
    snippet::{Snippet, SnippetGenerator},
};

use super::{
    compile::{MAX_EXPANSIONS, TextClause},
    suggest::LevenshteinDfa,
};
use crate::{error::BackendError, query::Highlight};

/// Indexed terms of `field` that the text clause matches.
///
/// These are the analyzed words themselves, the completions of a trailing prefix and the
/// words within the edit distance of fuzzy words.
fn matched_terms(
    searcher: &Searcher,
    field: Field,
    clause: &TextClause,
) -> Result<BTreeSet<String>, BackendError> {
    let mut terms: BTreeSet<String> = clause.terms.iter().cloned().collect();

    let last = clause.terms.last().filter(|_| clause.prefix);
    let mut builders = Vec::new();
    if let Some(fuzziness) = clause.fuzziness {
        for term in &clause.terms {
            let distance = fuzziness.max_distance(term.chars().count());
            if distance > 0 {
                builders.push((LevenshteinAutomatonBuilder::new(distance, true), term));
            }
        }
    }

    for segment in searcher.segment_readers() {
        let inverted = segment.inverted_index(field)?;
        let dictionary = inverted.terms();

        if let Some(prefix) = last {
            let mut stream = dictionary.range().ge(prefix).into_stream()?;
            let mut expanded = 0;
            while expanded < MAX_EXPANSIONS && stream.advance() {
                let Ok(key) = str::from_utf8(stream.key()) else {
                    continue;
                };
                if !key.starts_with(prefix.as_str()) {
                    break;
                }
                terms.insert(key.to_string());
                expanded += 1;
            }
        }

        for (builder, term) in &builders {
            let dfa = LevenshteinDfa(builder.build_dfa(term));
            let mut stream = dictionary.search(dfa).into_stream()?;
            while stream.advance() {
                if let Ok(key) = str::from_utf8(stream.key()) {
                    terms.insert(key.to_string());
                }
            }
        }
    }
    Ok(terms)
}

/// Builds a query whose terms are the words to highlight.
fn highlight_query(field: Field, words: &BTreeSet<String>) -> BooleanQuery {
    let clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = words
        .iter()
        .map(|word| {
            let term = Term::from_field_text(field, word);
            let query: Box<dyn TantivyQuery> = Box::new(BoostQuery::new(
                Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
                1.0,
            ));
            (Occur::Should, query)
        })
        .collect();
    BooleanQuery::new(clauses)
}

/// Wraps every highlighted range of the snippet in the tags.
fn render(snippet: &Snippet, pre: &str, post: &str) -> String {
    let fragment = snippet.fragment();
    let mut out = String::with_capacity(fragment.len());
    let mut start = 0;
    for range in snippet.highlighted() {
        if range.start < start {
            continue;
        }
        out.push_str(&fragment[start..range.start]);
        out.push_str(pre);
        out.push_str(&fragment[range.clone()]);
        out.push_str(post);
        start = range.end;
    }
    out.push_str(&fragment[start..]);
    out
}

/// Highlights one field of the hits of a search.
pub(super) struct Highlighter {
    /// Finds and scores the fragments.
    generator: SnippetGenerator,
    /// Inserted before each match.
    pre: String,
    /// Inserted after each match.
    post: String,
    /// Whether fragments are returned at all.
    enabled: bool,
}

impl Highlighter {
    /// Prepares highlighting of `field` for the given text clauses.
    ///
    /// Returns `None` when no indexed word of the field is matched.
    pub(super) fn new(
        searcher: &Searcher,
        field: Field,
        clauses: &[&TextClause],
        settings: &Highlight,
    ) -> Result<Option<Self>, BackendError> {
        let mut words = BTreeSet::new();
        for clause in clauses {
            words.extend(matched_terms(searcher, field, clause)?);
        }
        if words.is_empty() {
            return Ok(None);
        }

        let mut generator = SnippetGenerator::create(
            searcher,
            &highlight_query(field, &words),
            field,
        )?;
        if generator.terms_text().is_empty() {
            return Ok(None);
        }
        generator.set_max_num_chars(settings.fragment_size);

        Ok(Some(Self {
            generator,
            pre: settings
                .pre_tags
                .first()
                .map_or_else(|| "<em>".to_string(), Clone::clone),
            post: settings
                .post_tags
                .first()
                .map_or_else(|| "</em>".to_string(), Clone::clone),
            enabled: settings.number_of_fragments > 0,
        }))
    }

    /// Returns the highlighted fragments of a stored document; empty without a match.
    pub(super) fn fragments(&self, doc: &TantivyDocument) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let snippet = self.generator.snippet_from_doc(doc);
        if snippet.is_empty() {
            return Vec::new();
        }
        vec![render(&snippet, &self.pre, &self.post)]
    }
}

#[cfg(test)]
mod test {
    use tantivy::{
        Index, IndexWriter,
        schema::{STORED, Schema, TEXT},
    };

    use super::*;
    use crate::query::Fuzziness;

    fn index(texts: &[&str]) -> (Index, Field) {
        let mut builder = Schema::builder();
        let field = builder.add_text_field("text", TEXT | STORED);
        let index = Index::create_in_ram(builder.build());
        let mut writer: IndexWriter = index.writer_with_num_threads(1, 15_000_000).unwrap();
        for text in texts {
            let mut doc = TantivyDocument::new();
            doc.add_text(field, text);
            writer.add_document(doc).unwrap();
        }
        writer.commit().unwrap();
        (index, field)
    }

    fn clause(terms: &[&str], prefix: bool, fuzziness: Option<Fuzziness>) -> TextClause {
        TextClause {
            fields: vec!["text".into()],
            terms: terms.iter().map(|t| (*t).to_string()).collect(),
            prefix,
            fuzziness,
        }
    }

    fn highlight(texts: &[&str], clause: &TextClause, fragment_size: usize) -> Vec<String> {
        let (index, field) = index(texts);
        let searcher = index.reader().unwrap().searcher();
        let settings = Highlight {
            fragment_size,
            ..Highlight::default()
        };
        let Some(highlighter) = Highlighter::new(&searcher, field, &[clause], &settings).unwrap()
        else {
            return Vec::new();
        };
        let mut doc = TantivyDocument::new();
        doc.add_text(field, texts[0]);
        highlighter.fragments(&doc)
    }

    #[test]
    fn tags_matched_words_in_original_case() {
        assert_eq!(
            highlight(&["Acme Cloud hosting"], &clause(&["acme"], false, None), 150),
            vec!["<strong>Acme</strong> Cloud hosting"]
        );
    }

    #[test]
    fn long_text_is_cut_to_the_best_fragment() {
        let fragments = highlight(
            &["one two three acme four five"],
            &clause(&["acme"], false, None),
            10,
        );
        assert_eq!(fragments, vec!["three <strong>acme</strong>"]);
    }

    #[test]
    fn prefix_clauses_tag_completed_words() {
        assert_eq!(
            highlight(&["Acme Cloud"], &clause(&["clo"], true, None), 150),
            vec!["Acme <strong>Cloud</strong>"]
        );
    }

    #[test]
    fn fuzzy_clauses_tag_close_words() {
        assert_eq!(
            highlight(
                &["Acme Cloud"],
                &clause(&["clowd"], false, Some(Fuzziness::Auto)),
                150
            ),
            vec!["Acme <strong>Cloud</strong>"]
        );
    }

    #[test]
    fn nothing_to_match_yields_nothing() {
        assert!(highlight(&["Acme Cloud"], &clause(&["pricing"], false, None), 150).is_empty());
    }

    #[test]
    fn disabled_fragments_yield_nothing() {
        let (index, field) = index(&["Acme Cloud"]);
        let searcher = index.reader().unwrap().searcher();
        let settings = Highlight {
            number_of_fragments: 0,
            ..Highlight::default()
        };
        let acme = clause(&["acme"], false, None);
        let highlighter = Highlighter::new(&searcher, field, &[&acme], &settings)
            .unwrap()
            .unwrap();
        let mut doc = TantivyDocument::new();
        doc.add_text(field, "Acme Cloud");
        assert!(highlighter.fragments(&doc).is_empty());
    }
}
