//! Elasticsearch REST adapter over a blocking HTTP client.

use std::{fs, path::PathBuf, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{
    Certificate, Method, StatusCode, Url,
    blocking::{Client, RequestBuilder, Response},
};
use serde::{Deserialize, Serialize};

use super::SearchBackend;
use crate::{
    document::Document,
    error::BackendError,
    query::{Query, SearchRequest},
    response::SearchResponse,
    schema::IndexDefinition,
};

/// Default timeout for a single request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How requests authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Auth {
    /// No credentials.
    None,
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// `Authorization: ApiKey ...`.
    ApiKey(String),
}

/// Connection settings for an [`HttpBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Base URL, e.g. `https://localhost:9200`.
    pub base_url: String,
    /// Authentication.
    auth: Auth,
    /// PEM file with an additional trusted root certificate.
    pub ca_bundle: Option<PathBuf>,
    /// Timeout for a single request.
    pub timeout: Duration,
}

impl HttpSettings {
    /// Settings for a self-hosted node at `host`, with an optional port.
    ///
    /// A host without a scheme is reached over plain HTTP.
    pub fn direct(host: &str, port: Option<u16>) -> Self {
        let host = host.trim().trim_end_matches('/');
        let host = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };
        let base_url = match port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        Self {
            base_url,
            auth: Auth::None,
            ca_bundle: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Settings for a hosted cloud deployment, authenticated with an API key.
    pub fn cloud(cloud_id: &str, api_key: &str) -> Result<Self, BackendError> {
        Ok(Self {
            base_url: decode_cloud_id(cloud_id)?,
            auth: Auth::ApiKey(api_key.to_string()),
            ca_bundle: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Authenticates with HTTP basic auth. An empty user name disables authentication.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = if username.is_empty() {
            Auth::None
        } else {
            Auth::Basic {
                username: username.to_string(),
                password: password.to_string(),
            }
        };
        self
    }

    /// Trusts the root certificate in `path` in addition to the system roots.
    pub fn with_ca_bundle(mut self, path: PathBuf) -> Self {
        self.ca_bundle = Some(path);
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Decodes a cloud id into the deployment's Elasticsearch URL.
///
/// A cloud id is `name:base64(host$es_uuid[$kibana_uuid])`; the host may carry a `:port`
/// suffix. The result is `https://{es_uuid}.{host}`.
pub fn decode_cloud_id(cloud_id: &str) -> Result<String, BackendError> {
    let encoded = cloud_id
        .split_once(':')
        .map_or(cloud_id, |(_, encoded)| encoded)
        .trim();
    let invalid = || BackendError::Configuration(format!("invalid cloud id: {cloud_id}"));

    let bytes = STANDARD.decode(encoded).map_err(|_| invalid())?;
    let decoded = String::from_utf8(bytes).map_err(|_| invalid())?;
    let mut parts = decoded.split('$');
    let host = parts.next().map(|h| h.trim_end_matches('/')).unwrap_or_default();
    let es_uuid = parts.next().unwrap_or_default();
    if host.is_empty() || es_uuid.is_empty() {
        return Err(invalid());
    }

    Ok(match host.split_once(':') {
        Some((host, port)) => format!("https://{es_uuid}.{host}:{port}"),
        None => format!("https://{es_uuid}.{host}"),
    })
}

/// Body of a delete-by-query request.
#[derive(Debug, Serialize)]
struct DeleteByQueryRequest<'a> {
    /// Documents to delete.
    query: &'a Query,
}

/// Body of a delete-by-query response.
#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    /// Number of deleted documents.
    #[serde(default)]
    deleted: u64,
}

/// A [`SearchBackend`] speaking the Elasticsearch REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// Blocking HTTP client.
    client: Client,
    /// Base URL of the cluster.
    base: Url,
    /// Authentication applied to every request.
    auth: Auth,
}

impl HttpBackend {
    /// Builds a backend from connection settings.
    ///
    /// Fails if the base URL is invalid, the CA bundle cannot be read, or the client cannot
    /// be constructed. No request is sent.
    pub fn new(settings: HttpSettings) -> Result<Self, BackendError> {
        let base = Url::parse(&settings.base_url).map_err(|e| {
            BackendError::Configuration(format!("invalid URL {}: {e}", settings.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Configuration(format!(
                "invalid URL {}",
                settings.base_url
            )));
        }

        let mut builder = Client::builder().timeout(settings.timeout);
        if let Some(path) = &settings.ca_bundle {
            let pem = fs::read(path).map_err(|e| {
                BackendError::Configuration(format!(
                    "cannot read CA bundle {}: {e}",
                    path.display()
                ))
            })?;
            let certificate = Certificate::from_pem(&pem).map_err(|e| {
                BackendError::Configuration(format!("invalid CA bundle {}: {e}", path.display()))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base,
            auth: settings.auth,
        })
    }

    /// The cluster base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Builds a URL from percent-encoded path segments.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in `new`, so the segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds a URL whose writes are visible to the next search.
    fn refreshing_url(&self, segments: &[&str]) -> Url {
        let mut url = self.url(segments);
        url.query_pairs_mut().append_pair("refresh", "true");
        url
    }

    /// Starts an authenticated request.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth {
            Auth::None => builder,
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::ApiKey(key) => builder.header("Authorization", format!("ApiKey {key}")),
        }
    }

    /// Maps a non-success response to an error.
    fn check(response: Response, index: &str) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        if status == StatusCode::NOT_FOUND && body.contains("index_not_found_exception") {
            return Err(BackendError::MissingIndex(index.to_string()));
        }
        if body.contains("resource_already_exists_exception") {
            return Err(BackendError::IndexExists(index.to_string()));
        }
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Sends a HEAD request and maps 200/404 to true/false.
    fn head(&self, url: Url) -> Result<bool, BackendError> {
        let response = self.request(Method::HEAD, url).send()?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(BackendError::Status {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }
}

impl SearchBackend for HttpBackend {
    fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        self.head(self.url(&[index]))
    }

    fn create_index(
        &self,
        index: &str,
        definition: &IndexDefinition,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::PUT, self.url(&[index]))
            .json(definition)
            .send()?;
        Self::check(response, index)?;
        Ok(())
    }

    fn document_exists(&self, index: &str, id: &str) -> Result<bool, BackendError> {
        self.head(self.url(&[index, "_doc", id]))
    }

    fn delete_by_query(&self, index: &str, query: &Query) -> Result<u64, BackendError> {
        let response = self
            .request(
                Method::POST,
                self.refreshing_url(&[index, "_delete_by_query"]),
            )
            .json(&DeleteByQueryRequest { query })
            .send()?;
        let body: DeleteByQueryResponse = Self::check(response, index)?.json()?;
        Ok(body.deleted)
    }

    fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::PUT, self.refreshing_url(&[index, "_doc", id]))
            .json(document)
            .send()?;
        Self::check(response, index)?;
        Ok(())
    }

    fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, BackendError> {
        let response = self
            .request(Method::POST, self.url(&[index, "_search"]))
            .json(request)
            .send()?;
        Ok(Self::check(response, index)?.json()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_cloud_id_without_port() {
        let url = decode_cloud_id("deployment:ZXhhbXBsZS5jb20kYWJjJGRlZg==").unwrap();
        assert_eq!(url, "https://abc.example.com");
    }

    #[test]
    fn decode_cloud_id_with_port() {
        let url = decode_cloud_id("deployment:ZXhhbXBsZS5jb206OTI0MyRhYmM=").unwrap();
        assert_eq!(url, "https://abc.example.com:9243");
    }

    #[test]
    fn decode_cloud_id_rejects_garbage() {
        assert!(matches!(
            decode_cloud_id("deployment:not base64!"),
            Err(BackendError::Configuration(_))
        ));
        // "example.com" without a deployment uuid
        assert!(decode_cloud_id("deployment:ZXhhbXBsZS5jb20=").is_err());
    }

    #[test]
    fn direct_settings_build_base_url() {
        assert_eq!(
            HttpSettings::direct("https://search.local/", Some(9200)).base_url,
            "https://search.local:9200"
        );
        assert_eq!(
            HttpSettings::direct("localhost", None).base_url,
            "http://localhost"
        );
    }

    #[test]
    fn empty_username_disables_basic_auth() {
        let settings = HttpSettings::direct("localhost", None).with_basic_auth("", "secret");
        assert_eq!(settings.auth, Auth::None);
    }

    #[test]
    fn urls_are_percent_encoded() {
        let backend = HttpBackend::new(HttpSettings::direct("http://localhost", Some(9200)))
            .unwrap();
        let url = backend.url(&["prosearch_a b", "_doc", "1"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/prosearch_a%20b/_doc/1"
        );
        let url = backend.refreshing_url(&["idx", "_doc", "2"]);
        assert_eq!(url.as_str(), "http://localhost:9200/idx/_doc/2?refresh=true");
    }

    #[test]
    fn missing_ca_bundle_is_a_configuration_error() {
        let settings = HttpSettings::direct("https://localhost", None)
            .with_ca_bundle(PathBuf::from("/nonexistent/ca.pem"));
        assert!(matches!(
            HttpBackend::new(settings),
            Err(BackendError::Configuration(_))
        ));
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let backend = HttpBackend::new(
            HttpSettings::direct("http://127.0.0.1", Some(9))
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap();
        assert!(matches!(
            backend.index_exists("prosearch_x"),
            Err(BackendError::Transport(_))
        ));
    }
}
