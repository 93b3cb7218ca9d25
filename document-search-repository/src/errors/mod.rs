//! Error types for the document search repository.
//!
//! This module provides a unified error type for all facade and backend operations.

mod search_index_error;

pub use search_index_error::SearchIndexError;
