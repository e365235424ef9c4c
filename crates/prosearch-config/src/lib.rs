//! Configuration system for prosearch.
//!
//! prosearch uses a TOML configuration file named `.prosearch.toml`. The file is found by
//! walking up the directory tree from the current working directory; `~/.prosearch.toml` is
//! used when no local file exists. The file holds the backend credentials (which also carry
//! the tenant signature), search settings, and indexing settings.

#![warn(missing_docs)]

mod credentials;
mod discovery;
mod error;
mod parse;
mod templates;
#[cfg(test)]
mod test_support;
mod validate;

use std::path::{Path, PathBuf};

pub use credentials::Credentials;
pub use discovery::{CONFIG_FILENAME, discover_config_file, global_config_path, is_global_config};
pub use error::ConfigError;
pub use parse::{RawConfig, parse_config_file, parse_config_str};
use serde::{Deserialize, Serialize};
pub use templates::config_template;
pub use validate::ConfigWarning;
use validate::validate_config;

/// Names of the base analyzers an index can be created with.
pub const ANALYZER_NAMES: &[&str] = &["german", "english", "prosearch"];

/// Fully loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Backend credentials, if configured.
    pub credentials: Option<Credentials>,
    /// Search settings.
    pub search: SearchSettings,
    /// Indexing settings.
    pub indexing: IndexingSettings,
    /// The file this configuration was loaded from.
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration by discovering the closest `.prosearch.toml`.
    ///
    /// Returns `Ok(Config::default())` if no configuration file is found.
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        match discover_config_file(cwd) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(parse_config_file(path)?.into_config(path))
    }

    /// Validates the configuration and returns any warnings.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        validate_config(self)
    }

    /// Serializes the effective settings to TOML format, with secrets redacted.
    pub fn settings_to_toml(&self) -> String {
        let serializable = SerializableSettings {
            credentials: self.credentials.as_ref().map(Credentials::redacted),
            search: self.search.clone(),
            indexing: self.indexing.clone(),
        };
        toml::to_string_pretty(&serializable).expect("settings serialization should not fail")
    }
}

/// Search-related settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Base name of every index.
    pub index: String,
    /// Base analyzer used for the analyzed text fields.
    pub analyzer: String,
    /// Language code searches are filtered by.
    pub language: String,
    /// Host name searches are filtered by.
    pub domain: String,
    /// Maximum hits per search.
    pub per_page: usize,
    /// Site root whose index is searched.
    pub root_id: Option<u64>,
    /// Timeout for a single backend request, in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            index: String::from("prosearch"),
            analyzer: String::from("prosearch"),
            language: String::from("en"),
            domain: String::new(),
            per_page: 10,
            root_id: None,
            timeout_secs: 30,
        }
    }
}

/// Indexing-related settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexingSettings {
    /// Maximum records indexed per run.
    pub batch_size: usize,
    /// Path of the record store file.
    pub store: PathBuf,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            store: PathBuf::from("records.json"),
        }
    }
}

/// Internal struct for TOML serialization of settings.
#[derive(Serialize)]
struct SerializableSettings {
    /// Redacted credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<Credentials>,
    /// Search settings.
    search: SearchSettings,
    /// Indexing settings.
    indexing: IndexingSettings,
}
