//! OpenSearch implementation of the search backend.
//!
//! This module provides a concrete implementation of `SearchBackend`
//! using OpenSearch (or a wire-compatible Elasticsearch) as the engine.

mod backend;
mod pool;
mod response;

pub use backend::OpenSearchBackend;
