//! Validation errors raised while assembling a query.

use thiserror::Error;

/// A malformed `QuerySpec` or `Clause`.
///
/// These are caller errors: they are detected before anything is sent to a backend
/// and are never worth retrying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryValidationError {
    /// `limit` must be strictly positive.
    #[error("limit must be greater than zero")]
    ZeroLimit,

    /// A field is both requested and excluded from the returned source.
    #[error("field '{0}' is both included and excluded")]
    OverlappingSourceField(String),

    /// `minimum_should_match` outside of `0..=100`.
    #[error("minimum_should_match must be between 0 and 100, got {0}")]
    MinimumShouldMatchOutOfRange(u8),

    /// Boost values must be finite and positive.
    #[error("boost for field '{field}' must be a positive number, got {boost}")]
    InvalidBoost { field: String, boost: f64 },

    /// A multi-field match without any field to search.
    #[error("multi_match requires at least one field")]
    EmptyMultiMatchFields,

    /// A field name was empty.
    #[error("field name cannot be empty ({0})")]
    EmptyFieldName(&'static str),
}
