//! Document read and write types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document payload: field name to JSON value. No schema is enforced here.
pub type Document = serde_json::Map<String, Value>;

/// What a write did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteResultKind {
    Created,
    Updated,
    Deleted,
    /// The write was accepted but changed nothing.
    Noop,
}

impl WriteResultKind {
    /// Parse the `result` string reported by search engines.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            "noop" => Some(Self::Noop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Noop => "noop",
        }
    }
}

/// Acknowledgement of a single-document write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentWriteResult {
    pub id: String,
    pub index_name: String,
    pub result: WriteResultKind,
    /// Backend-assigned version, increasing with every write to the same id.
    pub version: u64,
}

/// Outcome of a write that targets an existing document.
///
/// A missing document is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    Written(DocumentWriteResult),
    NotFound,
}

impl WriteOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WriteOutcome::NotFound)
    }

    /// The write acknowledgement, if the document existed.
    pub fn written(&self) -> Option<&DocumentWriteResult> {
        match self {
            WriteOutcome::Written(result) => Some(result),
            WriteOutcome::NotFound => None,
        }
    }
}

/// A document as read back from an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub index_name: String,
    pub version: u64,
    pub source: Document,
}

/// Backend report of a delete-by-query run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteByQuerySummary {
    /// Documents actually deleted.
    pub deleted: u64,
    /// Documents the query matched.
    pub total: u64,
    /// Per-document or per-shard failure descriptions.
    #[serde(default)]
    pub failures: Vec<String>,
    #[serde(default)]
    pub timed_out: bool,
}

impl DeleteByQuerySummary {
    /// True when the run stopped before every matched document was deleted.
    pub fn is_partial(&self) -> bool {
        self.timed_out || !self.failures.is_empty()
    }
}
