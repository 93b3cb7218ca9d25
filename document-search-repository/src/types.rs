//! Compiled request types passed from the compiler to a backend.

use serde_json::Value;

/// A complete search request body in the backend query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSearch {
    body: Value,
}

impl CompiledSearch {
    pub fn from_value(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

/// A standalone query in the backend query language, as used by delete-by-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    query: Value,
}

impl CompiledQuery {
    pub fn from_value(query: Value) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &Value {
        &self.query
    }

    pub fn into_query(self) -> Value {
        self.query
    }
}
