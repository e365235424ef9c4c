//! Phrase suggestions: each input word is replaced by the closest indexed word.
//!
//! Candidates come from the term dictionary of the suggestion field, searched with a
//! Levenshtein automaton. Shingles in the dictionary are never proposed.

use std::{collections::BTreeMap, str};

use levenshtein_automata::{DFA, Distance, LevenshteinAutomatonBuilder, SINK_STATE};
use tantivy::{Searcher, schema::Field};
use tantivy_fst::Automaton;

use super::aggregate::live_docs;
use crate::{
    error::BackendError,
    query::{Fuzziness, PhraseSuggester},
    response::{SuggestEntry, SuggestOption},
};

/// Wrapper that implements `tantivy_fst::Automaton` for `levenshtein_automata::DFA`.
pub(super) struct LevenshteinDfa(pub(super) DFA);

impl Automaton for LevenshteinDfa {
    type State = u32;

    fn start(&self) -> Self::State {
        self.0.initial_state()
    }

    fn is_match(&self, state: &Self::State) -> bool {
        matches!(self.0.distance(*state), Distance::Exact(_))
    }

    fn can_match(&self, state: &Self::State) -> bool {
        *state != SINK_STATE
    }

    fn accept(&self, state: &Self::State, byte: u8) -> Self::State {
        self.0.transition(*state, byte)
    }
}

/// The single words indexed in one field.
pub(super) struct Vocabulary<'a> {
    /// Searcher over the index.
    searcher: &'a Searcher,
    /// Field the words are drawn from.
    field: Field,
}

impl<'a> Vocabulary<'a> {
    /// Creates the vocabulary of `field`.
    pub(super) fn new(searcher: &'a Searcher, field: Field) -> Self {
        Self { searcher, field }
    }

    /// Number of live documents containing `word`.
    fn doc_count(&self, word: &str) -> Result<u64, BackendError> {
        let mut count = 0;
        for segment in self.searcher.segment_readers() {
            let inverted = segment.inverted_index(self.field)?;
            if let Some(info) = inverted.terms().get(word)? {
                count += live_docs(segment, &inverted, &info)?;
            }
        }
        Ok(count)
    }

    /// Words accepted by the automaton of `word`, with their live document counts.
    fn candidates(
        &self,
        builder: &LevenshteinAutomatonBuilder,
        word: &str,
    ) -> Result<BTreeMap<String, u64>, BackendError> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for segment in self.searcher.segment_readers() {
            let inverted = segment.inverted_index(self.field)?;
            let dfa = LevenshteinDfa(builder.build_dfa(word));
            let mut stream = inverted.terms().search(dfa).into_stream()?;
            while stream.advance() {
                let Ok(key) = str::from_utf8(stream.key()) else {
                    continue;
                };
                if key.contains(' ') {
                    continue;
                }
                let live = live_docs(segment, &inverted, stream.value())?;
                if live > 0 {
                    *counts.entry(key.to_string()).or_default() += live;
                }
            }
        }
        Ok(counts)
    }
}

/// Returns the suggestion entries for `text`.
///
/// Words are lowercased and kept when indexed. An option is returned only when at least
/// one word was corrected.
pub(super) fn phrase(
    text: &str,
    vocabulary: &Vocabulary<'_>,
    settings: &PhraseSuggester,
) -> Result<Vec<SuggestEntry>, BackendError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut builders: BTreeMap<u8, LevenshteinAutomatonBuilder> = BTreeMap::new();
    let mut corrected = Vec::new();
    let mut highlighted = Vec::new();
    let mut total_distance = 0u32;

    for word in text.split_whitespace() {
        let word = word.to_lowercase();
        if vocabulary.doc_count(&word)? > 0 {
            highlighted.push(word.clone());
            corrected.push(word);
            continue;
        }

        let distance = Fuzziness::Auto.max_distance(word.chars().count());
        let candidate = if distance > 0 {
            let builder = builders
                .entry(distance)
                .or_insert_with(|| LevenshteinAutomatonBuilder::new(distance, true));
            closest(&builder.build_dfa(&word), &vocabulary.candidates(builder, &word)?)
        } else {
            None
        };

        match candidate {
            Some((replacement, edits)) => {
                total_distance += u32::from(edits);
                highlighted.push(format!(
                    "{}{replacement}{}",
                    settings.highlight.pre_tag, settings.highlight.post_tag
                ));
                corrected.push(replacement);
            }
            None => {
                highlighted.push(word.clone());
                corrected.push(word);
            }
        }
    }

    let mut options = Vec::new();
    if total_distance > 0 && settings.size > 0 {
        options.push(SuggestOption {
            text: corrected.join(" "),
            highlighted: Some(highlighted.join(" ")),
            score: 1.0 / f64::from(1 + total_distance),
        });
    }

    Ok(vec![SuggestEntry {
        text: text.to_string(),
        options,
    }])
}

/// Picks the candidate with the fewest edits, then the highest document count.
fn closest(dfa: &DFA, candidates: &BTreeMap<String, u64>) -> Option<(String, u8)> {
    candidates
        .iter()
        .filter_map(|(candidate, count)| match dfa.eval(candidate) {
            Distance::Exact(edits) => Some((candidate, *count, edits)),
            Distance::AtLeast(_) => None,
        })
        .min_by(|a, b| a.2.cmp(&b.2).then(b.1.cmp(&a.1)).then(a.0.cmp(b.0)))
        .map(|(candidate, _, edits)| (candidate.clone(), edits))
}

#[cfg(test)]
mod test {
    use tantivy::{
        Index, IndexWriter, TantivyDocument, Term,
        schema::{Schema, TEXT},
    };

    use super::*;
    use crate::query::Suggestion;

    fn settings() -> PhraseSuggester {
        Suggestion::did_you_mean("", "english").phrase
    }

    fn index(texts: &[&str]) -> (Index, IndexWriter, Field) {
        let mut builder = Schema::builder();
        let field = builder.add_text_field("words", TEXT);
        let index = Index::create_in_ram(builder.build());
        let mut writer: IndexWriter = index.writer_with_num_threads(1, 15_000_000).unwrap();
        for text in texts {
            let mut doc = TantivyDocument::new();
            doc.add_text(field, text);
            writer.add_document(doc).unwrap();
        }
        writer.commit().unwrap();
        (index, writer, field)
    }

    fn suggest(index: &Index, field: Field, text: &str) -> Vec<SuggestEntry> {
        let searcher = index.reader().unwrap().searcher();
        phrase(text, &Vocabulary::new(&searcher, field), &settings()).unwrap()
    }

    #[test]
    fn corrects_misspelled_words() {
        let (index, _writer, field) = index(&["acme cloud", "acme"]);

        let entries = suggest(&index, field, "acne cloud");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "acne cloud");
        let option = &entries[0].options[0];
        assert_eq!(option.text, "acme cloud");
        assert_eq!(option.highlighted.as_deref(), Some("<em>acme</em> cloud"));
        assert!((option.score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn known_words_produce_no_option() {
        let (index, _writer, field) = index(&["acme"]);
        let entries = suggest(&index, field, "Acme");
        assert!(entries[0].options.is_empty());
    }

    #[test]
    fn prefers_frequent_candidates() {
        let (index, _writer, field) = index(&["cart", "card", "card"]);
        let entries = suggest(&index, field, "carx");
        assert_eq!(entries[0].options[0].text, "card");
    }

    #[test]
    fn deleted_documents_are_not_counted() {
        let (index, mut writer, field) = index(&["cart", "card", "card"]);
        writer.delete_term(Term::from_field_text(field, "card"));
        writer.commit().unwrap();

        let entries = suggest(&index, field, "carx");
        assert_eq!(entries[0].options[0].text, "cart");
    }

    #[test]
    fn short_words_are_not_corrected() {
        let (index, _writer, field) = index(&["at"]);
        let entries = suggest(&index, field, "ab");
        assert!(entries[0].options.is_empty());
    }

    #[test]
    fn blank_text_has_no_entries() {
        let (index, _writer, field) = index(&[]);
        assert!(suggest(&index, field, "  ").is_empty());
    }
}
