//! In-memory implementation of the search backend.
//!
//! This module provides a `SearchBackend` that keeps documents in process memory and
//! interprets the query DSL produced by `QueryCompiler` directly. It is used by tests
//! and for running the service without a search cluster.

mod backend;
mod evaluator;
mod tokenizer;

pub use backend::InMemoryBackend;
pub use tokenizer::tokenize;
