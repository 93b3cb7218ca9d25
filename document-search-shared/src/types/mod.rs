//! This module defines the core data structures shared between the query layer and
//! every search backend.

pub mod clause;
pub mod document;
pub mod query_spec;
pub mod search_result;
