//! Integration tests for prosearch-config.
//!
//! Tests the full configuration loading pipeline: discovery -> parse -> resolve.

// Integration tests live outside cfg(test) by design
#![allow(clippy::tests_outside_test_module)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use prosearch_config::{CONFIG_FILENAME, Config, ConfigError, ConfigWarning, Credentials};

/// Test helper to create a temporary directory structure for tests.
struct TestEnv {
    root: tempfile::TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    /// Creates a directory and returns its path.
    fn create_dir(&self, rel_path: &str) -> PathBuf {
        let path = self.root.path().join(rel_path);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Creates a file with content and returns its path.
    fn create_file(&self, rel_path: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }
}

#[test]
fn test_load_from_nested_directory() {
    let env = TestEnv::new();
    env.create_file(
        &format!("site/{CONFIG_FILENAME}"),
        r#"
[credentials]
type = "direct"
signature = "tenant"
host = "http://localhost"
port = 9200

[search]
analyzer = "german"
language = "de"
domain = "example.de"
root_id = 7

[indexing]
batch_size = 3
"#,
    );
    let cwd = env.create_dir("site/pages/news");

    let config = Config::load(&cwd).unwrap();

    let credentials = config.credentials.as_ref().unwrap();
    assert_eq!(credentials.signature(), "tenant");
    assert_eq!(credentials.kind(), "direct");
    assert_eq!(config.search.analyzer, "german");
    assert_eq!(config.search.root_id, Some(7));
    assert_eq!(config.indexing.batch_size, 3);
    assert_eq!(
        config.indexing.store,
        env.path().join("site").join("records.json")
    );
    assert_eq!(
        config.config_path,
        Some(env.path().join("site").join(CONFIG_FILENAME))
    );
}

#[test]
fn test_load_from_file_reports_parse_errors() {
    let env = TestEnv::new();
    let path = env.create_file("broken.toml", "[credentials]\ntype = \"ftp\"\n");

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseToml { .. }));
}

#[test]
fn test_load_from_missing_file_reports_read_error() {
    let env = TestEnv::new();
    let err = Config::load_from_file(&env.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_cloud_config_validates_cleanly() {
    let env = TestEnv::new();
    let path = env.create_file(
        CONFIG_FILENAME,
        r#"
[credentials]
type = "cloud"
signature = "tenant"
cloud_id = "deployment:ZXhhbXBsZS5jb20kYWJjJGRlZg=="
api_key = "secret"

[search]
domain = "example.org"
"#,
    );

    let config = Config::load_from_file(&path).unwrap();
    assert!(matches!(
        config.credentials,
        Some(Credentials::Cloud { .. })
    ));
    assert!(config.validate().is_empty());
}

#[test]
fn test_license_config_warns() {
    let env = TestEnv::new();
    let path = env.create_file(
        CONFIG_FILENAME,
        "[credentials]\ntype = \"license\"\nsignature = \"tenant\"\n\n[search]\ndomain = \"example.org\"\n",
    );

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.validate(), vec![ConfigWarning::LicenseOnly]);
}
