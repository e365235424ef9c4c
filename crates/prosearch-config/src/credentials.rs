//! Backend credentials.
//!
//! Credentials select the backend family through their `type` key and carry the tenant
//! signature that scopes every index name.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Placeholder shown instead of secrets when credentials are rendered.
const REDACTED: &str = "***";

/// Credentials for one search backend installation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// A directly reachable cluster.
    Direct {
        /// Tenant signature.
        #[serde(default)]
        signature: String,
        /// Base URL or host name of the cluster.
        #[serde(default)]
        host: String,
        /// Optional port appended to the host.
        port: Option<u16>,
        /// Basic auth user name (empty disables basic auth).
        #[serde(default)]
        username: String,
        /// Basic auth password.
        #[serde(default)]
        password: String,
        /// Optional CA bundle in PEM format.
        cert: Option<PathBuf>,
    },
    /// A hosted cloud deployment addressed by its cloud id.
    Cloud {
        /// Tenant signature.
        #[serde(default)]
        signature: String,
        /// Cloud id of the deployment (`name:base64(host$uuid...)`).
        #[serde(default)]
        cloud_id: String,
        /// API key sent with every request.
        #[serde(default)]
        api_key: String,
    },
    /// A license without backend access.
    License {
        /// Tenant signature.
        #[serde(default)]
        signature: String,
    },
}

impl Credentials {
    /// Returns the tenant signature.
    pub fn signature(&self) -> &str {
        match self {
            Self::Direct { signature, .. }
            | Self::Cloud { signature, .. }
            | Self::License { signature } => signature,
        }
    }

    /// Returns the `type` discriminator as written in the config file.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Cloud { .. } => "cloud",
            Self::License { .. } => "license",
        }
    }

    /// Returns a copy with passwords and API keys replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::Direct { password, .. } if !password.is_empty() => {
                *password = REDACTED.to_string();
            }
            Self::Cloud { api_key, .. } if !api_key.is_empty() => {
                *api_key = REDACTED.to_string();
            }
            _ => {}
        }
        copy
    }

    /// Resolves a relative CA bundle path against the directory of the config file.
    pub(crate) fn resolve_paths(&mut self, config_dir: &Path) {
        if let Self::Direct {
            cert: Some(cert), ..
        } = self
            && cert.is_relative()
        {
            *cert = config_dir.join(&*cert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Credentials {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn parses_direct_credentials() {
        let creds = parse(
            r#"
type = "direct"
signature = "abc"
host = "https://search.local"
port = 9200
username = "elastic"
password = "secret"
cert = "ca.pem"
"#,
        );
        assert_eq!(creds.kind(), "direct");
        assert_eq!(creds.signature(), "abc");
        match creds {
            Credentials::Direct {
                host, port, cert, ..
            } => {
                assert_eq!(host, "https://search.local");
                assert_eq!(port, Some(9200));
                assert_eq!(cert, Some(PathBuf::from("ca.pem")));
            }
            other => panic!("unexpected credentials: {other:?}"),
        }
    }

    #[test]
    fn parses_cloud_credentials() {
        let creds = parse(
            r#"
type = "cloud"
signature = "abc"
cloud_id = "deployment:ZXhhbXBsZS5jb20kYWJjJGRlZg=="
api_key = "key"
"#,
        );
        assert_eq!(creds.kind(), "cloud");
        assert_eq!(creds.signature(), "abc");
    }

    #[test]
    fn license_without_signature_defaults_to_empty() {
        let creds = parse("type = \"license\"\n");
        assert_eq!(creds, Credentials::License {
            signature: String::new()
        });
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<Credentials, _> = toml::from_str("type = \"proxy\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn redacts_secrets() {
        let creds = Credentials::Cloud {
            signature: "abc".into(),
            cloud_id: "id".into(),
            api_key: "key".into(),
        };
        match creds.redacted() {
            Credentials::Cloud { api_key, .. } => assert_eq!(api_key, "***"),
            other => panic!("unexpected credentials: {other:?}"),
        }
    }

    #[test]
    fn redaction_keeps_empty_password_empty() {
        let creds = parse("type = \"direct\"\nhost = \"localhost\"\n");
        match creds.redacted() {
            Credentials::Direct { password, .. } => assert!(password.is_empty()),
            other => panic!("unexpected credentials: {other:?}"),
        }
    }

    #[test]
    fn resolves_relative_cert() {
        let mut creds = parse("type = \"direct\"\nhost = \"localhost\"\ncert = \"ca.pem\"\n");
        creds.resolve_paths(Path::new("/etc/prosearch"));
        match creds {
            Credentials::Direct { cert, .. } => {
                assert_eq!(cert, Some(PathBuf::from("/etc/prosearch/ca.pem")));
            }
            other => panic!("unexpected credentials: {other:?}"),
        }
    }
}
