//! Search index error types.
//!
//! This module defines the unified error type for all search operations, covering
//! caller mistakes, compiler defects and backend failures. A missing document is not
//! an error: reads and writes report it as a result value.

use document_search_shared::QueryValidationError;
use thiserror::Error;

/// Unified errors from search operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// The query itself is malformed. Caller error, never retried.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A request argument other than the query is invalid (empty index name, empty id ...).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A clause could not be translated or interpreted. Always a defect.
    #[error("Unsupported clause: {0}")]
    UnsupportedClause(String),

    /// The backend could not be reached. Retryable.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend did not answer in time. Retryable.
    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    /// The backend rejected a request the compiler produced.
    #[error("Backend rejected request with status {status}: {message}")]
    BackendRequest { status: u16, message: String },

    /// Failed to parse a backend response.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Delete-by-query stopped part way. `deleted` documents are gone.
    #[error("Delete by query incomplete after {deleted} deletions: {message}")]
    PartialDeleteByQuery { deleted: u64, message: String },

    /// Failed to set up the connection to the backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Invalid backend configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SearchIndexError {
    /// Create an invalid query error.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create an unsupported clause error.
    pub fn unsupported_clause(msg: impl Into<String>) -> Self {
        Self::UnsupportedClause(msg.into())
    }

    /// Create a backend unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a backend timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::BackendTimeout(msg.into())
    }

    /// Create a backend request error.
    pub fn request(status: u16, msg: impl Into<String>) -> Self {
        Self::BackendRequest {
            status,
            message: msg.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a partial delete-by-query error.
    pub fn partial_delete(deleted: u64, msg: impl Into<String>) -> Self {
        Self::PartialDeleteByQuery {
            deleted,
            message: msg.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// The facade itself never retries; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::BackendTimeout(_)
        )
    }
}

impl From<QueryValidationError> for SearchIndexError {
    fn from(err: QueryValidationError) -> Self {
        Self::InvalidQuery(err.to_string())
    }
}

impl From<serde_json::Error> for SearchIndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SearchIndexError::unavailable("down").is_retryable());
        assert!(SearchIndexError::timeout("slow").is_retryable());
        assert!(!SearchIndexError::invalid_query("bad").is_retryable());
        assert!(!SearchIndexError::request(400, "parsing_exception").is_retryable());
        assert!(!SearchIndexError::unsupported_clause("knn").is_retryable());
    }

    #[test]
    fn test_from_query_validation_error() {
        let err: SearchIndexError = QueryValidationError::ZeroLimit.into();
        assert!(matches!(err, SearchIndexError::InvalidQuery(_)));
        assert_eq!(err.to_string(), "Invalid query: limit must be greater than zero");
    }

    #[test]
    fn test_partial_delete_message() {
        let err = SearchIndexError::partial_delete(3, "search context timed out");
        assert_eq!(
            err.to_string(),
            "Delete by query incomplete after 3 deletions: search context timed out"
        );
    }
}
