//! Configuration types for the backend connection and the DocumentStore.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::errors::SearchIndexError;

/// Default endpoint list when `ES_URL` is not set.
pub const DEFAULT_ENDPOINTS: &str = "127.0.0.1:9200,127.0.0.1:9201";

/// Default user name when `ES_NAME` is not set.
pub const DEFAULT_USERNAME: &str = "elastic";

/// Default password when `ES_PASSWORD` is not set.
pub const DEFAULT_PASSWORD: &str = "elastic";

/// Default connect and request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 50;

/// Default cap on `offset + limit`, matching the usual index `max_result_window`.
pub const DEFAULT_MAX_RESULT_WINDOW: usize = 10_000;

/// Basic-auth credential pair.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Connection settings for a search backend.
///
/// These are plain values; the backend implementation decides how to apply them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// One or more `host:port` pairs or URLs.
    pub endpoints: Vec<String>,
    pub credentials: Option<BackendCredentials>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoints: split_endpoints(DEFAULT_ENDPOINTS),
            credentials: Some(BackendCredentials {
                username: DEFAULT_USERNAME.to_string(),
                password: DEFAULT_PASSWORD.to_string(),
            }),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl BackendConfig {
    /// Configuration for a single endpoint without credentials.
    pub fn single(endpoint: impl Into<String>) -> Self {
        Self {
            endpoints: vec![endpoint.into()],
            credentials: None,
            ..Self::default()
        }
    }

    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ES_URL`: comma separated endpoints (default: 127.0.0.1:9200,127.0.0.1:9201)
    /// - `ES_NAME`: user name (default: elastic)
    /// - `ES_PASSWORD`: password (default: elastic)
    /// - `ES_CONNECT_TIMEOUT_SECS`: connect timeout (default: 50)
    /// - `ES_REQUEST_TIMEOUT_SECS`: request timeout (default: 50)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoints = lookup("ES_URL").unwrap_or_else(|| DEFAULT_ENDPOINTS.to_string());
        let username = lookup("ES_NAME").unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let password = lookup("ES_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS)
        };

        Self {
            endpoints: split_endpoints(&endpoints),
            credentials: (!username.is_empty())
                .then_some(BackendCredentials { username, password }),
            connect_timeout: Duration::from_secs(secs("ES_CONNECT_TIMEOUT_SECS")),
            request_timeout: Duration::from_secs(secs("ES_REQUEST_TIMEOUT_SECS")),
        }
    }

    /// Check that at least one endpoint is configured and every endpoint parses.
    pub fn validate(&self) -> Result<(), SearchIndexError> {
        self.endpoint_urls().map(|_| ())
    }

    /// Validate the endpoint list and return it as URLs.
    ///
    /// Endpoints without a scheme are treated as `http://`.
    pub fn endpoint_urls(&self) -> Result<Vec<Url>, SearchIndexError> {
        if self.endpoints.is_empty() {
            return Err(SearchIndexError::config(
                "At least one endpoint must be configured",
            ));
        }

        self.endpoints
            .iter()
            .map(|endpoint| {
                let with_scheme = if endpoint.contains("://") {
                    endpoint.clone()
                } else {
                    format!("http://{}", endpoint)
                };
                Url::parse(&with_scheme).map_err(|e| {
                    SearchIndexError::config(format!("Invalid endpoint '{}': {}", endpoint, e))
                })
            })
            .collect()
    }
}

fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration for the DocumentStore.
#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    /// Maximum `offset + limit` accepted for a search.
    ///
    /// Set to `None` to let the backend decide.
    pub max_result_window: Option<usize>,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            max_result_window: Some(DEFAULT_MAX_RESULT_WINDOW),
        }
    }
}

impl DocumentStoreConfig {
    /// Create a config without a result window limit.
    pub fn unlimited() -> Self {
        Self {
            max_result_window: None,
        }
    }

    /// Create a config with a custom result window limit.
    pub fn with_max_result_window(max_result_window: usize) -> Self {
        Self {
            max_result_window: Some(max_result_window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BackendConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.endpoints, vec!["127.0.0.1:9200", "127.0.0.1:9201"]);
        assert_eq!(
            config.credentials.as_ref().map(|c| c.username.as_str()),
            Some("elastic")
        );
        assert_eq!(config.connect_timeout, Duration::from_secs(50));
        assert_eq!(config.request_timeout, Duration::from_secs(50));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = BackendConfig::from_lookup(lookup_from(&[
            ("ES_URL", " https://search.internal:9243 , 10.0.0.2:9200,"),
            ("ES_NAME", "reader"),
            ("ES_PASSWORD", "secret"),
            ("ES_REQUEST_TIMEOUT_SECS", "5"),
            ("ES_CONNECT_TIMEOUT_SECS", "not-a-number"),
        ]));

        assert_eq!(
            config.endpoints,
            vec!["https://search.internal:9243", "10.0.0.2:9200"]
        );
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(50));

        let urls = config.endpoint_urls().unwrap();
        assert_eq!(urls[0].as_str(), "https://search.internal:9243/");
        assert_eq!(urls[1].as_str(), "http://10.0.0.2:9200/");
    }

    #[test]
    fn test_empty_user_disables_credentials() {
        let config = BackendConfig::from_lookup(lookup_from(&[("ES_NAME", "")]));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_empty_endpoint_list_rejected() {
        let config = BackendConfig::from_lookup(lookup_from(&[("ES_URL", " , ")]));
        assert!(config.endpoints.is_empty());
        assert!(matches!(
            config.endpoint_urls(),
            Err(SearchIndexError::ConfigError(_))
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unparsable_endpoint_rejected() {
        let config = BackendConfig::single("http://[::1");
        assert!(matches!(config.validate(), Err(SearchIndexError::ConfigError(_))));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let config = BackendConfig::default();
        let debug = format!("{:?}", config);
        assert!(debug.contains("elastic"));
        assert!(!debug.contains("password: \"elastic\""));
    }

    #[test]
    fn test_document_store_config() {
        assert_eq!(
            DocumentStoreConfig::default().max_result_window,
            Some(DEFAULT_MAX_RESULT_WINDOW)
        );
        assert!(DocumentStoreConfig::unlimited().max_result_window.is_none());
        assert_eq!(
            DocumentStoreConfig::with_max_result_window(50).max_result_window,
            Some(50)
        );
    }
}
