//! # Document Search
//!
//! Command runner for the document search facade. It wires a `DocumentStore` to an
//! OpenSearch cluster (or an in-memory index) from environment variables and runs
//! one command per invocation.
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`commands`]: Command line definition and execution
//! - [`errors`]: Error types for the runner

pub mod commands;
pub mod config;
pub mod errors;

pub use commands::{Cli, Command};
pub use config::{Dependencies, RunnerSettings};
pub use errors::AppError;
