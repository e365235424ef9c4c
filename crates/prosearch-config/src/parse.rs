//! Configuration file parsing.
//!
//! Parses a `.prosearch.toml` file into a [`RawConfig`] that mirrors the TOML schema, then
//! resolves file-relative paths to produce a [`Config`].

use std::{fs, path::Path};

use serde::Deserialize;
#[cfg(test)]
use toml::de::Error as TomlError;

use crate::{Config, ConfigError, Credentials, IndexingSettings, SearchSettings};

/// Raw configuration as parsed directly from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    /// Backend credentials section.
    pub credentials: Option<Credentials>,
    /// Search settings section.
    pub search: SearchSettings,
    /// Indexing settings section.
    pub indexing: IndexingSettings,
}

impl RawConfig {
    /// Resolves paths relative to `config_dir` and produces the final configuration.
    pub fn into_config(self, config_path: &Path) -> Config {
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let mut credentials = self.credentials;
        if let Some(creds) = credentials.as_mut() {
            creds.resolve_paths(config_dir);
        }
        let mut indexing = self.indexing;
        if indexing.store.is_relative() {
            indexing.store = config_dir.join(&indexing.store);
        }
        Config {
            credentials,
            search: self.search,
            indexing,
            config_path: Some(config_path.to_path_buf()),
        }
    }
}

/// Parses a configuration file from disk.
pub fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, path)
}

/// Parses configuration from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses configuration from a TOML string without path context (tests only).
#[cfg(test)]
pub fn parse_config(contents: &str) -> Result<RawConfig, TomlError> {
    toml::from_str(contents)
}
