//! Configuration and dependency initialization.

mod dependencies;

pub use dependencies::{BackendKind, ConnectionMode, Dependencies, RunnerSettings};
