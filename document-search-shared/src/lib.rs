//! # Document Search Shared
//!
//! This crate defines the backend-agnostic data model of the document search facade:
//! the query intent callers program against (`QuerySpec`, `Clause`) and the uniform
//! result shapes every backend is normalized into (`SearchResult`, `Hit`, write results).

pub mod errors;
pub mod types;

pub use errors::QueryValidationError;
pub use types::clause::{
    BoolClause, Clause, FieldBoost, MatchClause, MatchOperator, MultiMatchClause, RangeClause,
    TermClause,
};
pub use types::document::{
    DeleteByQuerySummary, Document, DocumentWriteResult, StoredDocument, WriteOutcome,
    WriteResultKind,
};
pub use types::query_spec::{
    HighlightRequest, QuerySpec, QuerySpecBuilder, SortClause, SortDirection, SortField,
};
pub use types::search_result::{Hit, SearchResult, TotalHits, TotalHitsRelation};
