//! Search backend trait definition.
//!
//! This module defines the capability the DocumentStore depends on. Connection
//! pooling, authentication, transport retries and threading all live behind it.

use async_trait::async_trait;
use document_search_shared::{
    DeleteByQuerySummary, Document, DocumentWriteResult, StoredDocument, WriteOutcome,
};
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{CompiledQuery, CompiledSearch};

/// Abstracts the underlying search engine (OpenSearch, Elasticsearch, in-memory, ...).
///
/// Implementations are shared as `Arc<dyn SearchBackend>` and borrowed per call; the
/// DocumentStore never closes them. Every method is asynchronous, so callers that do
/// not await immediately can hand the returned future to a runtime.
///
/// Errors follow one convention across implementations: unreachable backends map to
/// `BackendUnavailable`, expired deadlines to `BackendTimeout`, and rejected requests to
/// `BackendRequest`. A missing document is reported through the return value.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Check that the backend answers.
    async fn ping(&self) -> Result<(), SearchIndexError>;

    /// Execute a compiled search against the given indexes and return the raw response.
    ///
    /// # Arguments
    ///
    /// * `indexes` - Index names to search, at least one
    /// * `request` - The compiled request body
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The backend response, to be normalized by the caller
    /// * `Err(SearchIndexError)` - If the search fails
    async fn execute(
        &self,
        indexes: &[String],
        request: &CompiledSearch,
    ) -> Result<Value, SearchIndexError>;

    /// Store a full document under the given id, replacing any previous version.
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<DocumentWriteResult, SearchIndexError>;

    /// Fetch a document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(StoredDocument))` - If the document exists
    /// * `Ok(None)` - If the document or the index doesn't exist
    /// * `Err(SearchIndexError)` - If the lookup fails
    async fn get_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, SearchIndexError>;

    /// Merge a partial document into an existing one.
    ///
    /// The document must already exist; `WriteOutcome::NotFound` is returned otherwise.
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Document,
    ) -> Result<WriteOutcome, SearchIndexError>;

    /// Delete a document by id. `WriteOutcome::NotFound` if it doesn't exist.
    async fn delete_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<WriteOutcome, SearchIndexError>;

    /// Delete every document matching the query in the given indexes.
    ///
    /// Partial progress is reported in the summary rather than as an error, so the
    /// caller always learns how many documents are gone.
    async fn delete_by_query(
        &self,
        indexes: &[String],
        query: &CompiledQuery,
    ) -> Result<DeleteByQuerySummary, SearchIndexError>;
}
