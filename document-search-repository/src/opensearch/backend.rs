//! OpenSearch backend implementation.
//!
//! This module provides the concrete implementation of `SearchBackend`
//! using the OpenSearch Rust crate. The same wire protocol is spoken by
//! Elasticsearch, so either engine can sit behind it.

use async_trait::async_trait;
use document_search_shared::{
    DeleteByQuerySummary, Document, DocumentWriteResult, StoredDocument, WriteOutcome,
};
use opensearch::{
    auth::Credentials,
    http::{
        response::Response,
        transport::{SingleNodeConnectionPool, Transport, TransportBuilder},
    },
    DeleteByQueryParts, DeleteParts, GetParts, IndexParts, OpenSearch, SearchParts, UpdateParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::pool::RoundRobinConnectionPool;
use super::response;
use crate::config::BackendConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchBackend;
use crate::types::{CompiledQuery, CompiledSearch};

/// OpenSearch backend implementation.
///
/// Holds one pooled client for the lifetime of the process. With more than one
/// endpoint configured, requests are spread round-robin across the nodes.
///
/// # Example
///
/// ```ignore
/// use document_search_repository::config::BackendConfig;
/// use document_search_repository::opensearch::OpenSearchBackend;
///
/// let backend = OpenSearchBackend::connect(&BackendConfig::from_env()).await?;
/// ```
pub struct OpenSearchBackend {
    client: OpenSearch,
    config: BackendConfig,
}

impl OpenSearchBackend {
    /// Create a backend for the configured endpoints without contacting them.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchBackend)` - A new backend instance
    /// * `Err(SearchIndexError::ConfigError)` - If an endpoint is not a valid URL
    /// * `Err(SearchIndexError::ConnectionError)` - If the transport cannot be built
    pub fn new(config: &BackendConfig) -> Result<Self, SearchIndexError> {
        let mut urls = config.endpoint_urls()?;

        let transport = if urls.len() == 1 {
            let url = urls.remove(0);
            Self::configure(TransportBuilder::new(SingleNodeConnectionPool::new(url)), config)
        } else {
            Self::configure(TransportBuilder::new(RoundRobinConnectionPool::new(urls)), config)
        }?;

        info!(
            endpoints = ?config.endpoints,
            authenticated = config.credentials.is_some(),
            request_timeout_secs = config.request_timeout.as_secs(),
            "Created OpenSearch backend"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
            config: config.clone(),
        })
    }

    /// Create a backend and verify that the cluster answers within the connect timeout.
    pub async fn connect(config: &BackendConfig) -> Result<Self, SearchIndexError> {
        let backend = Self::new(config)?;
        backend.ping().await?;
        Ok(backend)
    }

    fn configure(
        builder: TransportBuilder,
        config: &BackendConfig,
    ) -> Result<Transport, SearchIndexError> {
        let mut builder = builder.timeout(config.request_timeout).disable_proxy();
        if let Some(credentials) = &config.credentials {
            builder = builder.auth(Credentials::Basic(
                credentials.username.clone(),
                credentials.password.clone(),
            ));
        }
        builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))
    }

    fn index_names(indexes: &[String]) -> Vec<&str> {
        indexes.iter().map(String::as_str).collect()
    }

    /// Read the JSON body of a successful response, or map the failure status.
    async fn json_body(response: Response, operation: &str) -> Result<Value, SearchIndexError> {
        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, operation = operation, "Request failed");
            return Err(response::status_error(status.as_u16(), &body));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(format!("{} response: {}", operation, e)))
    }

    /// Like `json_body`, but a 404 is an expected outcome and yields `None`.
    async fn json_body_or_missing(
        response: Response,
        operation: &str,
    ) -> Result<Option<Value>, SearchIndexError> {
        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        Self::json_body(response, operation).await.map(Some)
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    async fn ping(&self) -> Result<(), SearchIndexError> {
        let request = self.client.ping().send();
        let response = tokio::time::timeout(self.config.connect_timeout, request)
            .await
            .map_err(|_| {
                SearchIndexError::timeout(format!(
                    "no answer from {:?} within {}s",
                    self.config.endpoints,
                    self.config.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| response::transport_error(&e))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Ping rejected");
            return Err(response::status_error(status.as_u16(), &body));
        }
        debug!("Ping succeeded");
        Ok(())
    }

    async fn execute(
        &self,
        indexes: &[String],
        request: &CompiledSearch,
    ) -> Result<Value, SearchIndexError> {
        let names = Self::index_names(indexes);
        let response = self
            .client
            .search(SearchParts::Index(&names))
            .body(request.body().clone())
            .send()
            .await
            .map_err(|e| response::transport_error(&e))?;

        Self::json_body(response, "search").await
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<DocumentWriteResult, SearchIndexError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(document)
            .send()
            .await
            .map_err(|e| response::transport_error(&e))?;

        let body = Self::json_body(response, "index").await?;
        response::parse_write_result(&body)
    }

    async fn get_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, SearchIndexError> {
        let response = self
            .client
            .get(GetParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| response::transport_error(&e))?;

        match Self::json_body_or_missing(response, "get").await? {
            Some(body) => response::parse_stored_document(&body),
            None => Ok(None),
        }
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Document,
    ) -> Result<WriteOutcome, SearchIndexError> {
        let response = self
            .client
            .update(UpdateParts::IndexId(index, id))
            .body(json!({ "doc": partial }))
            .send()
            .await
            .map_err(|e| response::transport_error(&e))?;

        match Self::json_body_or_missing(response, "update").await? {
            Some(body) => Ok(WriteOutcome::Written(response::parse_write_result(&body)?)),
            None => Ok(WriteOutcome::NotFound),
        }
    }

    async fn delete_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<WriteOutcome, SearchIndexError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| response::transport_error(&e))?;

        // A delete of a missing id answers 404 with a regular write body.
        let status = response.status_code().as_u16();
        if status == 404 {
            return Ok(WriteOutcome::NotFound);
        }

        let body = Self::json_body(response, "delete").await?;
        Ok(WriteOutcome::Written(response::parse_write_result(&body)?))
    }

    async fn delete_by_query(
        &self,
        indexes: &[String],
        query: &CompiledQuery,
    ) -> Result<DeleteByQuerySummary, SearchIndexError> {
        let names = Self::index_names(indexes);
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&names))
            .body(json!({ "query": query.query() }))
            .send()
            .await
            .map_err(|e| response::transport_error(&e))?;

        // Version conflicts abort the run with 409 but still carry the full report.
        let status = response.status_code();
        if status.as_u16() == 409 {
            let body = response
                .json::<Value>()
                .await
                .map_err(|e| SearchIndexError::parse(format!("delete_by_query response: {}", e)))?;
            return response::parse_delete_by_query(&body);
        }

        let body = Self::json_body(response, "delete_by_query").await?;
        response::parse_delete_by_query(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendCredentials;
    use std::time::Duration;

    #[test]
    fn test_new_single_endpoint() {
        let backend = OpenSearchBackend::new(&BackendConfig::single("localhost:9200"));
        assert!(backend.is_ok());
    }

    #[test]
    fn test_new_multiple_endpoints_with_credentials() {
        let config = BackendConfig {
            endpoints: vec!["10.0.0.1:9200".to_string(), "https://10.0.0.2:9200".to_string()],
            credentials: Some(BackendCredentials {
                username: "elastic".to_string(),
                password: "elastic".to_string(),
            }),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        };
        assert!(OpenSearchBackend::new(&config).is_ok());
    }

    #[test]
    fn test_new_rejects_empty_endpoints() {
        let config = BackendConfig {
            endpoints: Vec::new(),
            ..BackendConfig::default()
        };
        assert!(matches!(
            OpenSearchBackend::new(&config),
            Err(SearchIndexError::ConfigError(_))
        ));
    }
}
