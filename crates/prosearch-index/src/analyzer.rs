//! Text analysis definitions for prosearch indices.
//!
//! An index is created with a fixed [`AnalyzerSet`]:
//! - `german` and `english`: whitespace tokenizer, lowercase, language stop words, stemmer
//! - `prosearch`: whitespace tokenizer, lowercase
//! - `autocomplete`: whitespace tokenizer, lowercase, shingles of 2 to 4 words
//!
//! The definitions serialize to the backend's analysis settings. [`Pipeline`] runs the same
//! definitions locally on tantivy's tokenizer stack, for backends that analyze in-process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tantivy::tokenizer::{
    Language, LowerCaser, Stemmer, StopWordFilter, TextAnalyzer, Token, TokenStream,
    WhitespaceTokenizer,
};

use crate::IndexError;

/// Name of the shingle analyzer backing the `autocomplete` field.
pub const AUTOCOMPLETE: &str = "autocomplete";

/// Name of the language-neutral base analyzer.
pub const GENERIC: &str = "prosearch";

/// Smallest shingle emitted by the autocomplete filter.
pub const MIN_SHINGLE_SIZE: usize = 2;

/// Largest shingle emitted by the autocomplete filter.
pub const MAX_SHINGLE_SIZE: usize = 4;

/// Languages with a dedicated base analyzer.
const LANGUAGES: [&str; 2] = ["german", "english"];

/// A custom analyzer: one tokenizer followed by named token filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    /// Always `custom`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Tokenizer name.
    pub tokenizer: String,
    /// Token filters, applied in order.
    pub filter: Vec<String>,
}

impl AnalyzerDefinition {
    /// Creates a whitespace-tokenized custom analyzer.
    fn whitespace(filters: &[&str]) -> Self {
        Self {
            kind: "custom".to_string(),
            tokenizer: "whitespace".to_string(),
            filter: filters.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// A named token filter referenced by analyzer definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenFilterDefinition {
    /// Emits word n-grams next to the original tokens.
    Shingle {
        /// Smallest n-gram.
        min_shingle_size: usize,
        /// Largest n-gram.
        max_shingle_size: usize,
    },
    /// Language stemmer.
    Stemmer {
        /// Stemmer language name.
        language: String,
    },
    /// Stop word removal.
    Stop {
        /// Stop word lists, e.g. `_german_`.
        stopwords: Vec<String>,
    },
}

/// The `analysis` block of the index settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Analyzers by name.
    pub analyzer: BTreeMap<String, AnalyzerDefinition>,
    /// Token filters by name.
    pub filter: BTreeMap<String, TokenFilterDefinition>,
}

/// The catalogue of analyzers every index is created with.
pub struct AnalyzerSet;

impl AnalyzerSet {
    /// Returns the base analyzers selectable for the text fields.
    pub fn base() -> BTreeMap<String, AnalyzerDefinition> {
        let mut analyzers = BTreeMap::new();
        for language in LANGUAGES {
            let stop = format!("{language}_stopwords");
            let stem = format!("{language}_stemmer");
            analyzers.insert(
                language.to_string(),
                AnalyzerDefinition::whitespace(&["lowercase", &stop, &stem]),
            );
        }
        analyzers.insert(
            GENERIC.to_string(),
            AnalyzerDefinition::whitespace(&["lowercase"]),
        );
        analyzers
    }

    /// Returns the names of the base analyzers.
    pub fn names() -> Vec<String> {
        Self::base().into_keys().collect()
    }

    /// Returns true if `name` is a base analyzer.
    pub fn is_base(name: &str) -> bool {
        name == GENERIC || LANGUAGES.contains(&name)
    }

    /// Returns the full analysis settings: base analyzers, autocomplete, and their filters.
    pub fn analysis() -> Analysis {
        let mut analyzer = Self::base();
        analyzer.insert(
            AUTOCOMPLETE.to_string(),
            AnalyzerDefinition::whitespace(&["lowercase", AUTOCOMPLETE]),
        );

        let mut filter = BTreeMap::new();
        filter.insert(
            AUTOCOMPLETE.to_string(),
            TokenFilterDefinition::Shingle {
                min_shingle_size: MIN_SHINGLE_SIZE,
                max_shingle_size: MAX_SHINGLE_SIZE,
            },
        );
        for language in LANGUAGES {
            filter.insert(
                format!("{language}_stemmer"),
                TokenFilterDefinition::Stemmer {
                    language: language.to_string(),
                },
            );
            filter.insert(
                format!("{language}_stopwords"),
                TokenFilterDefinition::Stop {
                    stopwords: vec![format!("_{language}_")],
                },
            );
        }

        Analysis { analyzer, filter }
    }
}

/// Parses a stemmer language string into a Tantivy `Language`.
///
/// Supports lowercase language names matching Tantivy's `Language` enum.
pub fn parse_language(name: &str) -> Result<Language, IndexError> {
    match name.to_lowercase().as_str() {
        "arabic" => Ok(Language::Arabic),
        "danish" => Ok(Language::Danish),
        "dutch" => Ok(Language::Dutch),
        "english" => Ok(Language::English),
        "finnish" => Ok(Language::Finnish),
        "french" => Ok(Language::French),
        "german" => Ok(Language::German),
        "greek" => Ok(Language::Greek),
        "hungarian" => Ok(Language::Hungarian),
        "italian" => Ok(Language::Italian),
        "norwegian" => Ok(Language::Norwegian),
        "portuguese" => Ok(Language::Portuguese),
        "romanian" => Ok(Language::Romanian),
        "russian" => Ok(Language::Russian),
        "spanish" => Ok(Language::Spanish),
        "swedish" => Ok(Language::Swedish),
        "tamil" => Ok(Language::Tamil),
        "turkish" => Ok(Language::Turkish),
        other => Err(IndexError::InvalidAnalyzer(other.to_string())),
    }
}

/// Builds the stop word filter for a list name such as `_german_`.
///
/// Languages tantivy ships no stop words for are rejected.
fn stop_filter(list: &str) -> Result<StopWordFilter, IndexError> {
    let language = parse_language(list.trim_matches('_'))?;
    StopWordFilter::new(language)
        .ok_or_else(|| IndexError::InvalidAnalyzer(format!("stop words {list}")))
}

/// An analyzer definition compiled into a local token pipeline.
///
/// Every pipeline tokenizes on whitespace and lowercases; stop words, stemming and shingles
/// follow the definition's filters.
#[derive(Clone)]
pub struct Pipeline {
    /// Tokenizer plus token filters.
    analyzer: TextAnalyzer,
    /// Shingle sizes, when the definition emits shingles.
    shingles: Option<(usize, usize)>,
}

impl Pipeline {
    /// Compiles `definition`, resolving filter names against `filters`.
    pub fn compile(
        definition: &AnalyzerDefinition,
        filters: &BTreeMap<String, TokenFilterDefinition>,
    ) -> Result<Self, IndexError> {
        if definition.tokenizer != "whitespace" {
            return Err(IndexError::InvalidAnalyzer(format!(
                "tokenizer {}",
                definition.tokenizer
            )));
        }

        let mut stop = None;
        let mut stem = None;
        let mut shingles = None;
        for name in &definition.filter {
            if name == "lowercase" {
                continue;
            }
            match filters.get(name) {
                Some(TokenFilterDefinition::Stop { stopwords }) => {
                    if let Some(list) = stopwords.first() {
                        stop = Some(stop_filter(list)?);
                    }
                }
                Some(TokenFilterDefinition::Stemmer { language }) => {
                    stem = Some(parse_language(language)?);
                }
                Some(TokenFilterDefinition::Shingle {
                    min_shingle_size,
                    max_shingle_size,
                }) => {
                    if *min_shingle_size < 2 || min_shingle_size > max_shingle_size {
                        return Err(IndexError::InvalidAnalyzer(format!(
                            "shingle sizes {min_shingle_size}..{max_shingle_size}"
                        )));
                    }
                    shingles = Some((*min_shingle_size, *max_shingle_size));
                }
                None => return Err(IndexError::InvalidAnalyzer(format!("filter {name}"))),
            }
        }

        Ok(Self {
            analyzer: build_analyzer(stop, stem),
            shingles,
        })
    }

    /// Compiles one of the analyzers of the standard [`AnalyzerSet`].
    pub fn standard(name: &str) -> Result<Self, IndexError> {
        let analysis = AnalyzerSet::analysis();
        let definition = analysis
            .analyzer
            .get(name)
            .ok_or_else(|| IndexError::InvalidAnalyzer(name.to_string()))?;
        Self::compile(definition, &analysis.filter)
    }

    /// The tokenizer and filters, without shingles.
    pub fn text_analyzer(&self) -> TextAnalyzer {
        self.analyzer.clone()
    }

    /// Returns true if the pipeline emits shingles.
    pub fn has_shingles(&self) -> bool {
        self.shingles.is_some()
    }

    /// Analyzes `text` into positional tokens, without shingles.
    pub fn analyze(&mut self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut stream = self.analyzer.token_stream(text);
        while let Some(token) = stream.next() {
            tokens.push(token.clone());
        }
        tokens
    }

    /// Analyzes `text` into tokens, followed by shingles when configured.
    ///
    /// A shingle sits at the position of its first word and spans the offsets of its words.
    pub fn shingled(&mut self, text: &str) -> Vec<Token> {
        let unigrams = self.analyze(text);
        let Some((min, max)) = self.shingles else {
            return unigrams;
        };

        let mut shingles = Vec::new();
        for size in min..=max {
            for window in unigrams.windows(size) {
                let (Some(first), Some(last)) = (window.first(), window.last()) else {
                    continue;
                };
                let words: Vec<&str> = window.iter().map(|t| t.text.as_str()).collect();
                shingles.push(Token {
                    offset_from: first.offset_from,
                    offset_to: last.offset_to,
                    position: first.position,
                    text: words.join(" "),
                    position_length: size,
                });
            }
        }

        let mut tokens = unigrams;
        tokens.extend(shingles);
        tokens
    }

    /// Analyzes `text` into token texts, followed by shingles when configured.
    pub fn tokens(&mut self, text: &str) -> Vec<String> {
        self.shingled(text).into_iter().map(|t| t.text).collect()
    }

    /// Analyzes `text` into token texts, without shingles.
    pub fn terms(&mut self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }
}

/// Builds the tantivy analyzer for the given stop word filter and stemmer language.
fn build_analyzer(stop: Option<StopWordFilter>, stem: Option<Language>) -> TextAnalyzer {
    match (stop, stem) {
        (Some(stop), Some(stem)) => TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .filter(stop)
            .filter(Stemmer::new(stem))
            .build(),
        (Some(stop), None) => TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .filter(stop)
            .build(),
        (None, Some(stem)) => TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(stem))
            .build(),
        (None, None) => TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .build(),
    }
}
