//! Configuration validation.
//!
//! Validates a loaded configuration and reports warnings for potential issues.

use std::fmt;

use crate::{ANALYZER_NAMES, Config, Credentials};

/// A non-fatal warning about the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No `[credentials]` section; the backend is unavailable.
    NoCredentials,
    /// Credentials exist but carry no tenant signature.
    MissingSignature,
    /// Direct credentials without a host.
    MissingHost,
    /// Cloud credentials without a cloud id or API key.
    IncompleteCloudCredentials,
    /// The configured CA bundle does not exist.
    CertificateMissing {
        /// Path that doesn't exist.
        path: String,
    },
    /// License-only credentials; indexing and search are disabled.
    LicenseOnly,
    /// The base analyzer is not one of the known analyzers.
    UnknownAnalyzer {
        /// The configured analyzer name.
        analyzer: String,
    },
    /// `per_page` is zero, so searches can never return hits.
    ZeroPageSize,
    /// `batch_size` is zero, so indexing never selects records.
    ZeroBatchSize,
    /// No domain is configured; searches are not filtered by host.
    NoDomain,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no credentials configured; backend is unavailable"),
            Self::MissingSignature => {
                write!(f, "credentials have no signature; backend is unavailable")
            }
            Self::MissingHost => write!(f, "direct credentials have no host"),
            Self::IncompleteCloudCredentials => {
                write!(f, "cloud credentials need both cloud_id and api_key")
            }
            Self::CertificateMissing { path } => {
                write!(f, "CA bundle does not exist: {path}")
            }
            Self::LicenseOnly => {
                write!(f, "license-only credentials; indexing and search are disabled")
            }
            Self::UnknownAnalyzer { analyzer } => write!(
                f,
                "unknown analyzer '{analyzer}' (expected one of: {})",
                ANALYZER_NAMES.join(", ")
            ),
            Self::ZeroPageSize => write!(f, "search.per_page is 0"),
            Self::ZeroBatchSize => write!(f, "indexing.batch_size is 0"),
            Self::NoDomain => write!(f, "search.domain is empty"),
        }
    }
}

/// Validates the configuration and returns any warnings.
pub fn validate_config(config: &Config) -> Vec<ConfigWarning> {
    let mut warnings = match &config.credentials {
        Some(credentials) => validate_credentials(credentials),
        None => vec![ConfigWarning::NoCredentials],
    };

    if !ANALYZER_NAMES.contains(&config.search.analyzer.as_str()) {
        warnings.push(ConfigWarning::UnknownAnalyzer {
            analyzer: config.search.analyzer.clone(),
        });
    }
    if config.search.per_page == 0 {
        warnings.push(ConfigWarning::ZeroPageSize);
    }
    if config.indexing.batch_size == 0 {
        warnings.push(ConfigWarning::ZeroBatchSize);
    }
    if config.search.domain.is_empty() {
        warnings.push(ConfigWarning::NoDomain);
    }

    warnings
}

/// Validates a credentials section.
fn validate_credentials(credentials: &Credentials) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if credentials.signature().is_empty() {
        warnings.push(ConfigWarning::MissingSignature);
    }

    match credentials {
        Credentials::Direct { host, cert, .. } => {
            if host.trim().is_empty() {
                warnings.push(ConfigWarning::MissingHost);
            }
            if let Some(cert) = cert
                && !cert.is_file()
            {
                warnings.push(ConfigWarning::CertificateMissing {
                    path: cert.display().to_string(),
                });
            }
        }
        Credentials::Cloud {
            cloud_id, api_key, ..
        } => {
            if cloud_id.is_empty() || api_key.is_empty() {
                warnings.push(ConfigWarning::IncompleteCloudCredentials);
            }
        }
        Credentials::License { .. } => warnings.push(ConfigWarning::LicenseOnly),
    }

    warnings
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{IndexingSettings, SearchSettings, test_support::TestDir};

    fn config_with(credentials: Option<Credentials>) -> Config {
        Config {
            credentials,
            search: SearchSettings {
                domain: "example.org".into(),
                ..SearchSettings::default()
            },
            indexing: IndexingSettings::default(),
            config_path: None,
        }
    }

    fn direct(host: &str, cert: Option<PathBuf>) -> Credentials {
        Credentials::Direct {
            signature: "abc".into(),
            host: host.into(),
            port: None,
            username: String::new(),
            password: String::new(),
            cert,
        }
    }

    #[test]
    fn valid_direct_config_has_no_warnings() {
        let dir = TestDir::new();
        let cert = dir.create_file("ca.pem", "-----BEGIN CERTIFICATE-----\n");
        let config = config_with(Some(direct("localhost", Some(cert))));
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn missing_credentials_warns() {
        let warnings = validate_config(&config_with(None));
        assert_eq!(warnings, vec![ConfigWarning::NoCredentials]);
    }

    #[test]
    fn empty_signature_and_host_warn() {
        let creds = Credentials::Direct {
            signature: String::new(),
            host: " ".into(),
            port: None,
            username: String::new(),
            password: String::new(),
            cert: None,
        };
        let warnings = validate_config(&config_with(Some(creds)));
        assert!(warnings.contains(&ConfigWarning::MissingSignature));
        assert!(warnings.contains(&ConfigWarning::MissingHost));
    }

    #[test]
    fn missing_certificate_warns() {
        let creds = direct("localhost", Some(PathBuf::from("/nonexistent/ca.pem")));
        let warnings = validate_config(&config_with(Some(creds)));
        assert_eq!(warnings, vec![ConfigWarning::CertificateMissing {
            path: "/nonexistent/ca.pem".into()
        }]);
    }

    #[test]
    fn incomplete_cloud_credentials_warn() {
        let creds = Credentials::Cloud {
            signature: "abc".into(),
            cloud_id: "id".into(),
            api_key: String::new(),
        };
        let warnings = validate_config(&config_with(Some(creds)));
        assert_eq!(warnings, vec![ConfigWarning::IncompleteCloudCredentials]);
    }

    #[test]
    fn license_only_warns() {
        let creds = Credentials::License {
            signature: "abc".into(),
        };
        let warnings = validate_config(&config_with(Some(creds)));
        assert_eq!(warnings, vec![ConfigWarning::LicenseOnly]);
    }

    #[test]
    fn search_settings_are_checked() {
        let mut config = config_with(Some(direct("localhost", None)));
        config.search.analyzer = "klingon".into();
        config.search.per_page = 0;
        config.search.domain = String::new();
        config.indexing.batch_size = 0;

        let warnings = validate_config(&config);
        assert!(warnings.contains(&ConfigWarning::UnknownAnalyzer {
            analyzer: "klingon".into()
        }));
        assert!(warnings.contains(&ConfigWarning::ZeroPageSize));
        assert!(warnings.contains(&ConfigWarning::ZeroBatchSize));
        assert!(warnings.contains(&ConfigWarning::NoDomain));
    }

    #[test]
    fn warning_messages_are_descriptive() {
        let warning = ConfigWarning::UnknownAnalyzer {
            analyzer: "klingon".into(),
        };
        let message = warning.to_string();
        assert!(message.contains("klingon"));
        assert!(message.contains("german"));
    }
}
