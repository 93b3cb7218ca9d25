//! Error types for the document search command runner.

use document_search_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur while configuring the runner or executing a command.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The command line could not be understood.
    #[error("Usage error: {0}")]
    UsageError(String),

    /// Error from the document store.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// Error writing output.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing a JSON argument or rendering a result.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::UsageError(msg.into())
    }
}
