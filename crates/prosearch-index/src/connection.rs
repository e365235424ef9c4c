//! Resolving credentials into a backend connection.
//!
//! A [`ConnectionProvider`] turns the configured [`Credentials`] into a [`Connection`]: a
//! tenant signature plus a [`SearchBackend`]. Every failure degrades to `None`; the reason is
//! reported to the event sink.

use std::{fmt, sync::Arc, time::Duration};

use prosearch_config::{Config, Credentials};

use crate::{
    backend::{HttpBackend, HttpSettings, SearchBackend},
    error::BackendError,
    schema::index_name,
    sink::EventSink,
};

/// Event origin for connection failures.
const ORIGIN: &str = "ConnectionProvider::connect";

/// Message reported whenever no connection could be established.
pub const NO_CONNECTION: &str = "No connection to the server could be established";

/// Supplies the current credentials.
pub trait CredentialsSource {
    /// Returns the credentials, or `None` if none are configured.
    fn credentials(&self) -> Option<Credentials>;
}

impl CredentialsSource for Config {
    fn credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}

impl CredentialsSource for Credentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.clone())
    }
}

impl CredentialsSource for Option<Credentials> {
    fn credentials(&self) -> Option<Credentials> {
        self.clone()
    }
}

/// A tenant's connection to a search backend.
#[derive(Clone)]
pub struct Connection {
    /// Tenant signature, part of every index name.
    signature: String,
    /// The backend.
    backend: Arc<dyn SearchBackend>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wraps a backend for a tenant.
    pub fn new(signature: impl Into<String>, backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            signature: signature.into(),
            backend,
        }
    }

    /// The tenant signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The backend.
    pub fn backend(&self) -> &dyn SearchBackend {
        self.backend.as_ref()
    }

    /// The name of this tenant's index for a base name and optional site root.
    pub fn index_name(&self, base: &str, root_id: Option<u64>) -> String {
        index_name(base, &self.signature, root_id)
    }
}

/// Produces connections on demand.
pub trait Connector {
    /// Returns a connection, or `None` when the backend is unavailable.
    fn connect(&self) -> Option<Connection>;
}

impl Connector for Connection {
    fn connect(&self) -> Option<Connection> {
        Some(self.clone())
    }
}

/// Builds HTTP connections from a credentials source.
pub struct ConnectionProvider<S> {
    /// Where credentials come from.
    source: S,
    /// Receives connection failures.
    sink: Arc<dyn EventSink>,
    /// Timeout for a single backend request.
    timeout: Duration,
}

impl<S: CredentialsSource> ConnectionProvider<S> {
    /// Creates a provider with the default request timeout.
    pub fn new(source: S, sink: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            sink,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout of built backends.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the adapter for one credentials variant.
    ///
    /// Returns `Ok(None)` for license-only credentials.
    fn build(&self, credentials: &Credentials) -> Result<Option<HttpBackend>, BackendError> {
        let settings = match credentials {
            Credentials::Direct {
                host,
                port,
                username,
                password,
                cert,
                ..
            } => {
                let settings =
                    HttpSettings::direct(host, *port).with_basic_auth(username, password);
                match cert {
                    Some(path) => settings.with_ca_bundle(path.clone()),
                    None => settings,
                }
            }
            Credentials::Cloud {
                cloud_id, api_key, ..
            } => HttpSettings::cloud(cloud_id, api_key)?,
            Credentials::License { .. } => return Ok(None),
        };
        HttpBackend::new(settings.with_timeout(self.timeout)).map(Some)
    }
}

impl<S: CredentialsSource> Connector for ConnectionProvider<S> {
    fn connect(&self) -> Option<Connection> {
        let credentials = self.source.credentials()?;

        let backend = match self.build(&credentials) {
            Ok(Some(backend)) => Some(backend),
            Ok(None) => return None,
            Err(e) => {
                self.sink.error(ORIGIN, &e.to_string());
                None
            }
        };

        let signature = credentials.signature().trim();
        match backend {
            Some(backend) if !signature.is_empty() => {
                Some(Connection::new(signature, Arc::new(backend)))
            }
            _ => {
                self.sink.error(ORIGIN, NO_CONNECTION);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        backend::MemoryBackend,
        sink::{Level, RecordingSink},
    };

    fn direct(signature: &str) -> Credentials {
        Credentials::Direct {
            signature: signature.to_string(),
            host: "http://localhost".to_string(),
            port: Some(9200),
            username: "elastic".to_string(),
            password: "secret".to_string(),
            cert: None,
        }
    }

    fn provider<S: CredentialsSource>(source: S) -> (ConnectionProvider<S>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        (ConnectionProvider::new(source, sink.clone()), sink)
    }

    #[test]
    fn direct_credentials_connect() {
        let (provider, sink) = provider(direct("tenant"));
        let connection = provider.connect().unwrap();
        assert_eq!(connection.signature(), "tenant");
        assert_eq!(
            connection.index_name("prosearch", Some(2)),
            "prosearch_tenant_2"
        );
        assert!(sink.events().is_empty());
    }

    #[test]
    fn missing_credentials_are_silent() {
        let (provider, sink) = provider(None::<Credentials>);
        assert!(provider.connect().is_none());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn license_only_is_silent() {
        let (provider, sink) = provider(Credentials::License {
            signature: "tenant".into(),
        });
        assert!(provider.connect().is_none());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn empty_signature_reports_error() {
        let (provider, sink) = provider(direct("  "));
        assert!(provider.connect().is_none());
        assert_eq!(sink.messages(Level::Error), vec![NO_CONNECTION]);
    }

    #[test]
    fn invalid_cloud_id_is_unavailable() {
        let (provider, sink) = provider(Credentials::Cloud {
            signature: "tenant".into(),
            cloud_id: "broken".into(),
            api_key: "key".into(),
        });
        assert!(provider.connect().is_none());

        let errors = sink.messages(Level::Error);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("invalid cloud id"));
        assert_eq!(errors[1], NO_CONNECTION);
    }

    #[test]
    fn unreadable_certificate_is_unavailable() {
        let mut credentials = direct("tenant");
        if let Credentials::Direct { cert, .. } = &mut credentials {
            *cert = Some(PathBuf::from("/nonexistent/ca.pem"));
        }
        let (provider, sink) = provider(credentials);
        assert!(provider.connect().is_none());
        assert!(sink.messages(Level::Error)[0].contains("CA bundle"));
    }

    #[test]
    fn config_is_a_credentials_source() {
        let config = Config {
            credentials: Some(direct("tenant")),
            ..Config::default()
        };
        assert_eq!(config.credentials().unwrap().signature(), "tenant");
    }

    #[test]
    fn fixed_connection_connects_to_itself() {
        let connection = Connection::new("tenant", Arc::new(MemoryBackend::new()));
        let again = connection.connect().unwrap();
        assert_eq!(again.signature(), "tenant");
        assert!(!again.backend().index_exists("prosearch_tenant").unwrap());
    }
}
