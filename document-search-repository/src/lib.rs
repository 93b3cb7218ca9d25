//! # Document Search Repository
//!
//! This crate provides the document store facade and everything behind it: the
//! query compiler, the result normalizer, the `SearchBackend` trait and its
//! OpenSearch and in-memory implementations.

pub mod compiler;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod normalizer;
pub mod opensearch;
pub mod service;
pub mod types;
pub mod utils;

pub use compiler::QueryCompiler;
pub use config::{BackendConfig, BackendCredentials, DocumentStoreConfig};
pub use errors::SearchIndexError;
pub use interfaces::SearchBackend;
pub use memory::InMemoryBackend;
pub use normalizer::ResultNormalizer;
pub use opensearch::OpenSearchBackend;
pub use service::{DocumentStore, SearchHandle};
pub use types::{CompiledQuery, CompiledSearch};
