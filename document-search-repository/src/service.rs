//! Document store service implementation.
//!
//! This module provides the main entry point for reading, writing and searching
//! documents. Each operation validates its arguments, compiles queries with
//! `QueryCompiler`, makes exactly one backend call and normalizes the response.
//! The store holds no mutable state of its own.

use std::sync::Arc;

use document_search_shared::{
    Clause, Document, DocumentWriteResult, QuerySpec, SearchResult, StoredDocument, WriteOutcome,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use crate::compiler::QueryCompiler;
use crate::config::DocumentStoreConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchBackend;
use crate::normalizer::ResultNormalizer;
use crate::types::CompiledSearch;
use crate::utils;

/// The main service for interacting with search indexes.
///
/// This is the high-level API that application code should use. It provides input
/// validation and delegates to a `SearchBackend` for the actual engine calls. All
/// operations return `SearchIndexError` for consistent error handling; a missing
/// document is reported through the return value instead.
///
/// The backend is shared, never closed by the store, and may be used concurrently
/// by any number of stores or tasks.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use document_search_repository::{DocumentStore, InMemoryBackend};
/// use document_search_shared::{Clause, QuerySpec};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = DocumentStore::new(Arc::new(InMemoryBackend::new()));
///
/// let document = json!({ "name": "kimchy", "price": 3.14 });
/// store.create("docs", "1", document.as_object().unwrap()).await?;
///
/// let spec = QuerySpec::for_clause(Clause::term("name", "kimchy"));
/// let result = store.search(&spec, &["docs".to_string()]).await?;
/// assert_eq!(result.total_hits.value, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn SearchBackend>,
    config: DocumentStoreConfig,
}

impl DocumentStore {
    /// Create a new DocumentStore with default configuration.
    ///
    /// The default configuration caps `offset + limit` at 10 000.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            config: DocumentStoreConfig::default(),
        }
    }

    /// Create a new DocumentStore with custom configuration.
    pub fn with_config(backend: Arc<dyn SearchBackend>, config: DocumentStoreConfig) -> Self {
        Self { backend, config }
    }

    /// Check that `offset + limit` stays within the configured result window.
    fn validate_result_window(&self, spec: &QuerySpec) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_result_window {
            let window = spec.offset.saturating_add(spec.limit);
            if window > max {
                return Err(SearchIndexError::invalid_query(format!(
                    "offset + limit is {}, the result window is limited to {}",
                    window, max
                )));
            }
        }
        Ok(())
    }

    fn validate_document_ref(index: &str, id: &str) -> Result<(), SearchIndexError> {
        utils::validate_index_name(index)?;
        utils::validate_document_id(id)
    }

    /// Validate and compile a search. Shared by the blocking and async paths.
    fn prepare_search(
        &self,
        spec: &QuerySpec,
        indexes: &[String],
    ) -> Result<CompiledSearch, SearchIndexError> {
        utils::validate_indexes(indexes)?;
        spec.validate()?;
        self.validate_result_window(spec)?;
        Ok(QueryCompiler::compile_search(spec))
    }

    /// Store a document under the given id, replacing any previous version.
    ///
    /// # Arguments
    ///
    /// * `index` - Target index name
    /// * `id` - Caller-assigned document id
    /// * `document` - Field name to JSON value mapping; no schema is enforced
    ///
    /// # Returns
    ///
    /// * `Ok(DocumentWriteResult)` - Kind `Created` or `Updated` with the new version
    /// * `Err(SearchIndexError::ValidationError)` - If the index name or id is invalid
    /// * `Err(SearchIndexError)` - If the backend call fails
    #[instrument(skip(self, document), fields(field_count = document.len()))]
    pub async fn create(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<DocumentWriteResult, SearchIndexError> {
        Self::validate_document_ref(index, id)?;

        let result = self.backend.index_document(index, id, document).await?;
        debug!(
            result = result.result.as_str(),
            version = result.version,
            "Document written"
        );
        Ok(result)
    }

    /// Fetch a document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(StoredDocument))` - The stored fields, exactly as written
    /// * `Ok(None)` - If no document with this id exists
    /// * `Err(SearchIndexError)` - If validation or the backend call fails
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, SearchIndexError> {
        Self::validate_document_ref(index, id)?;

        let document = self.backend.get_document(index, id).await?;
        debug!(found = document.is_some(), "Document fetched");
        Ok(document)
    }

    /// Whether a document with this id exists.
    #[instrument(skip(self))]
    pub async fn exists(&self, index: &str, id: &str) -> Result<bool, SearchIndexError> {
        Ok(self.get(index, id).await?.is_some())
    }

    /// Merge a partial document into an existing one.
    ///
    /// Fields present in `partial` replace the stored values (nested objects are
    /// merged); fields absent from it are left unchanged. This is not an upsert.
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome::Written(_))` - Kind `Updated`, or `Noop` if nothing changed
    /// * `Ok(WriteOutcome::NotFound)` - If the document doesn't exist
    /// * `Err(SearchIndexError)` - If validation or the backend call fails
    #[instrument(skip(self, partial), fields(field_count = partial.len()))]
    pub async fn update(
        &self,
        index: &str,
        id: &str,
        partial: &Document,
    ) -> Result<WriteOutcome, SearchIndexError> {
        Self::validate_document_ref(index, id)?;
        if partial.is_empty() {
            return Err(SearchIndexError::validation(
                "Partial document must contain at least one field",
            ));
        }

        let outcome = self.backend.update_document(index, id, partial).await?;
        debug!(not_found = outcome.is_not_found(), "Document update finished");
        Ok(outcome)
    }

    /// Delete a document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome::Written(_))` - Kind `Deleted`
    /// * `Ok(WriteOutcome::NotFound)` - If the document doesn't exist
    /// * `Err(SearchIndexError)` - If validation or the backend call fails
    #[instrument(skip(self))]
    pub async fn delete(&self, index: &str, id: &str) -> Result<WriteOutcome, SearchIndexError> {
        Self::validate_document_ref(index, id)?;

        let outcome = self.backend.delete_document(index, id).await?;
        debug!(not_found = outcome.is_not_found(), "Document delete finished");
        Ok(outcome)
    }

    /// Delete every document matching `clause` in the given indexes.
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Number of documents deleted
    /// * `Err(SearchIndexError::PartialDeleteByQuery)` - If the run stopped part way;
    ///   carries the number of documents that were deleted before it stopped
    /// * `Err(SearchIndexError)` - If validation or the backend call fails
    #[instrument(skip(self, clause), fields(indexes = ?indexes))]
    pub async fn delete_by_query(
        &self,
        clause: &Clause,
        indexes: &[String],
    ) -> Result<u64, SearchIndexError> {
        utils::validate_indexes(indexes)?;
        clause.validate()?;

        let query = QueryCompiler::compile_query(clause);
        let summary = self.backend.delete_by_query(indexes, &query).await?;

        if summary.is_partial() {
            warn!(
                deleted = summary.deleted,
                total = summary.total,
                failures = summary.failures.len(),
                timed_out = summary.timed_out,
                "Delete by query incomplete"
            );
            let message = if summary.failures.is_empty() {
                format!("timed out after deleting {} of {}", summary.deleted, summary.total)
            } else {
                summary.failures.join("; ")
            };
            return Err(SearchIndexError::partial_delete(summary.deleted, message));
        }

        info!(deleted = summary.deleted, "Delete by query finished");
        Ok(summary.deleted)
    }

    /// Run a search and wait for the normalized result.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - Hits in backend order with totals and optional highlights
    /// * `Err(SearchIndexError::InvalidQuery)` - If the `QuerySpec` is malformed or exceeds the result window
    /// * `Err(SearchIndexError)` - If the backend call or response parsing fails
    #[instrument(
        skip(self, spec),
        fields(indexes = ?indexes, offset = spec.offset, limit = spec.limit)
    )]
    pub async fn search(
        &self,
        spec: &QuerySpec,
        indexes: &[String],
    ) -> Result<SearchResult, SearchIndexError> {
        let request = self.prepare_search(spec, indexes)?;
        let raw = self.backend.execute(indexes, &request).await?;
        let result = ResultNormalizer::normalize(&raw, spec.clause.is_scoring())?;

        debug!(
            total = result.total_hits.value,
            returned = result.len(),
            took_ms = result.took_ms,
            "Search finished"
        );
        Ok(result)
    }

    /// Start a search without waiting for it.
    ///
    /// The search runs on a spawned Tokio task and exactly one of the callbacks is
    /// invoked on that task when it finishes, unless the handle is cancelled first.
    /// Validation failures are delivered to `on_error` the same way. Must be called
    /// from within a Tokio runtime.
    pub fn search_async<C, E>(
        &self,
        spec: QuerySpec,
        indexes: Vec<String>,
        on_complete: C,
        on_error: E,
    ) -> SearchHandle
    where
        C: FnOnce(SearchResult) + Send + 'static,
        E: FnOnce(SearchIndexError) + Send + 'static,
    {
        let prepared = self.prepare_search(&spec, &indexes);
        let scoring = spec.clause.is_scoring();
        let backend = Arc::clone(&self.backend);
        let span = info_span!(
            "search_async",
            indexes = ?indexes,
            offset = spec.offset,
            limit = spec.limit
        );

        let task = tokio::spawn(
            async move {
                let outcome = match prepared {
                    Ok(request) => match backend.execute(&indexes, &request).await {
                        Ok(raw) => ResultNormalizer::normalize(&raw, scoring),
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(result) => {
                        debug!(total = result.total_hits.value, "Async search finished");
                        on_complete(result);
                    }
                    Err(e) => {
                        warn!(error = %e, "Async search failed");
                        on_error(e);
                    }
                }
            }
            .instrument(span),
        );

        SearchHandle { task }
    }
}

/// Handle to a search started with `DocumentStore::search_async`.
///
/// Dropping the handle detaches the search; it keeps running and its callback still fires.
#[derive(Debug)]
pub struct SearchHandle {
    task: JoinHandle<()>,
}

impl SearchHandle {
    /// Request cancellation.
    ///
    /// If the search has not delivered its result yet, no callback will run.
    /// Cancelling a finished search has no effect.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the search has finished or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the search to settle.
    ///
    /// Returns `true` when a callback ran and `false` when the search was cancelled.
    /// A panic inside a callback is resumed on the caller.
    pub async fn join(self) -> bool {
        match self.task.await {
            Ok(()) => true,
            Err(e) if e.is_cancelled() => false,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}
