//! Search result types.
//!
//! These are the uniform shapes every backend response is normalized into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a total hit count is exact or only a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalHitsRelation {
    #[default]
    Exact,
    /// The backend stopped counting; the real total is at least `value`.
    LowerBound,
}

/// Total number of matching documents, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    pub relation: TotalHitsRelation,
}

impl TotalHits {
    pub fn exact(value: u64) -> Self {
        Self {
            value,
            relation: TotalHitsRelation::Exact,
        }
    }

    pub fn lower_bound(value: u64) -> Self {
        Self {
            value,
            relation: TotalHitsRelation::LowerBound,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.relation == TotalHitsRelation::Exact
    }
}

/// A single matching document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub index_name: String,
    /// Relevance score. `None` when the query did not compute scores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Returned source fields.
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
    /// Highlighted fragments per field, in backend order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub highlights: BTreeMap<String, Vec<String>>,
}

/// The normalized outcome of one search execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub total_hits: TotalHits,
    /// Highest score among the hits. `None` when no scoring took place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    pub hits: Vec<Hit>,
    /// Time the backend spent executing the search, in milliseconds.
    #[serde(default)]
    pub took_ms: u64,
    /// Whether the backend gave up before visiting every shard.
    #[serde(default)]
    pub timed_out: bool,
}

impl SearchResult {
    /// Create an empty search result.
    pub fn empty() -> Self {
        Self {
            total_hits: TotalHits::exact(0),
            max_score: None,
            hits: Vec::new(),
            took_ms: 0,
            timed_out: false,
        }
    }

    /// Returns true if there are no hits on this page.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns the number of hits on this page.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Ids of the returned hits, in rank order.
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_empty() {
        let result = SearchResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
        assert_eq!(result.total_hits, TotalHits::exact(0));
        assert!(result.max_score.is_none());
    }

    #[test]
    fn test_total_hits_relation() {
        assert!(TotalHits::exact(3).is_exact());
        assert!(!TotalHits::lower_bound(10_000).is_exact());
    }

    #[test]
    fn test_serialization_skips_missing_scores() {
        let result = SearchResult {
            total_hits: TotalHits::exact(1),
            max_score: None,
            hits: vec![Hit {
                id: "1".to_string(),
                index_name: "docs".to_string(),
                score: None,
                fields: serde_json::Map::new(),
                highlights: BTreeMap::new(),
            }],
            took_ms: 2,
            timed_out: false,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("max_score").is_none());
        assert!(json["hits"][0].get("score").is_none());

        let deserialized: SearchResult = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, result);
    }
}
