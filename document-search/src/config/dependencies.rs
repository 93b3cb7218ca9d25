//! Dependency initialization and wiring for the command runner.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::AppError;
use document_search_repository::config::DEFAULT_MAX_RESULT_WINDOW;
use document_search_repository::{
    BackendConfig, DocumentStore, DocumentStoreConfig, InMemoryBackend, OpenSearchBackend,
    SearchBackend,
};

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for the search cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    #[value(alias = "failfast", alias = "fail_fast")]
    FailFast,
    /// Retry connection every retry interval until successful.
    Retry,
}

/// Which `SearchBackend` implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// An OpenSearch or Elasticsearch cluster.
    #[value(name = "opensearch", alias = "elasticsearch")]
    OpenSearch,
    /// A process-local index that lives for a single run.
    #[value(alias = "in-memory")]
    Memory,
}

/// Runner settings, taken from flags or the environment.
///
/// Cluster endpoints, credentials and timeouts are read by `BackendConfig::from_env`
/// (`ES_URL`, `ES_NAME`, `ES_PASSWORD`, `ES_CONNECT_TIMEOUT_SECS`, `ES_REQUEST_TIMEOUT_SECS`).
#[derive(Debug, Clone, Args)]
pub struct RunnerSettings {
    /// Search backend to run against
    #[arg(
        long,
        env = "SEARCH_BACKEND",
        value_enum,
        ignore_case = true,
        default_value_t = BackendKind::OpenSearch
    )]
    pub backend: BackendKind,

    /// What to do when the cluster cannot be reached
    #[arg(
        long,
        env = "ES_CONNECTION_MODE",
        value_enum,
        ignore_case = true,
        default_value_t = ConnectionMode::FailFast
    )]
    pub connection_mode: ConnectionMode,

    /// Seconds between connection attempts in retry mode
    #[arg(long, env = "ES_RETRY_INTERVAL_SECS", default_value_t = DEFAULT_RETRY_INTERVAL_SECS)]
    pub retry_interval_secs: u64,

    /// Largest accepted offset + limit, 0 disables the check
    #[arg(long, env = "ES_MAX_RESULT_WINDOW", default_value_t = DEFAULT_MAX_RESULT_WINDOW)]
    pub max_result_window: usize,
}

impl RunnerSettings {
    fn store_config(&self) -> DocumentStoreConfig {
        match self.max_result_window {
            0 => DocumentStoreConfig::unlimited(),
            window => DocumentStoreConfig::with_max_result_window(window),
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The document store wired to the configured backend.
    pub store: DocumentStore,
}

impl Dependencies {
    /// Initialize all dependencies from the runner settings.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(AppError)` - If the configuration is invalid or the cluster is unreachable in fail-fast mode
    pub async fn new(settings: &RunnerSettings) -> Result<Self, AppError> {
        let backend: Arc<dyn SearchBackend> = match settings.backend {
            BackendKind::Memory => {
                info!("Using in-memory search backend");
                Arc::new(InMemoryBackend::new())
            }
            BackendKind::OpenSearch => {
                let config = BackendConfig::from_env();
                config.validate().map_err(|e| AppError::config(e.to_string()))?;

                info!(
                    endpoints = ?config.endpoints,
                    connection_mode = ?settings.connection_mode,
                    retry_interval_secs = settings.retry_interval_secs,
                    "Initializing dependencies"
                );

                let backend = Self::connect_to_cluster(
                    &config,
                    settings.connection_mode,
                    Duration::from_secs(settings.retry_interval_secs),
                )
                .await?;

                info!("Search cluster connection established");
                Arc::new(backend)
            }
        };

        Ok(Self {
            store: DocumentStore::with_config(backend, settings.store_config()),
        })
    }

    /// Connect to the cluster with retry logic based on connection mode.
    async fn connect_to_cluster(
        config: &BackendConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchBackend, AppError> {
        loop {
            match OpenSearchBackend::connect(config).await {
                Ok(backend) => return Ok(backend),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(AppError::config(format!(
                            "Failed to connect to search cluster: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry if e.is_retryable() => {
                        warn!(
                            endpoints = ?config.endpoints,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to search cluster, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                    ConnectionMode::Retry => return Err(e.into()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: RunnerSettings,
    }

    fn settings(args: &[&str]) -> RunnerSettings {
        Harness::try_parse_from(std::iter::once("document-search").chain(args.iter().copied()))
            .unwrap()
            .settings
    }

    #[test]
    fn test_connection_mode_flag() {
        let parsed = settings(&["--connection-mode", "RETRY"]);
        assert_eq!(parsed.connection_mode, ConnectionMode::Retry);

        let parsed = settings(&["--connection-mode", "fail_fast"]);
        assert_eq!(parsed.connection_mode, ConnectionMode::FailFast);

        let invalid =
            Harness::try_parse_from(["document-search", "--connection-mode", "sometimes"]);
        assert!(invalid.is_err());
    }

    #[test]
    fn test_backend_flag() {
        assert_eq!(settings(&["--backend", "Memory"]).backend, BackendKind::Memory);
        assert_eq!(settings(&["--backend", "elasticsearch"]).backend, BackendKind::OpenSearch);
        assert!(Harness::try_parse_from(["document-search", "--backend", "solr"]).is_err());
    }

    #[test]
    fn test_store_config() {
        let unlimited = settings(&["--max-result-window", "0"]);
        assert!(unlimited.store_config().max_result_window.is_none());

        let capped = settings(&["--max-result-window", "500"]);
        assert_eq!(capped.store_config().max_result_window, Some(500));
    }

    #[tokio::test]
    async fn test_memory_backend_needs_no_cluster() {
        let deps = Dependencies::new(&settings(&["--backend", "memory"])).await.unwrap();
        let outcome = deps.store.delete("docs", "1").await.unwrap();
        assert_eq!(outcome, document_search_shared::WriteOutcome::NotFound);
    }
}
