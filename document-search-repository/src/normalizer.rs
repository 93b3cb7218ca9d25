//! Result normalizer.
//!
//! Turns a raw Elasticsearch/OpenSearch search response into a `SearchResult`.
//! Normalization is a pure function of the response body.

use std::collections::BTreeMap;

use document_search_shared::{Document, Hit, SearchResult, TotalHits};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::SearchIndexError;

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    timed_out: bool,
    hits: RawHits,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    max_score: Option<f64>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// Older engines report a bare number, newer ones an object with an accuracy flag.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Detailed { value: u64, relation: RawRelation },
}

#[derive(Debug, Deserialize)]
enum RawRelation {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "gte")]
    Gte,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Option<Document>,
    #[serde(default)]
    highlight: Option<BTreeMap<String, Vec<String>>>,
}

/// Stateless converter from raw backend responses to `SearchResult`.
pub struct ResultNormalizer;

impl ResultNormalizer {
    /// Normalize a raw search response.
    ///
    /// * A missing or null `max_score` stays `None`; it is never replaced by zero.
    /// * When `scoring` is false the query computed no relevance, so `max_score` and
    ///   every hit score are `None` even if the engine reported `0.0`.
    /// * Missing highlight data yields an empty highlight map.
    /// * The backend's total-hits accuracy flag is passed through unchanged. When the
    ///   total is absent entirely, the number of returned hits is reported as a lower bound.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResult)` - The normalized result
    /// * `Err(SearchIndexError::ParseError)` - If the response has no recognizable hits section
    pub fn normalize(raw: &Value, scoring: bool) -> Result<SearchResult, SearchIndexError> {
        let response = RawSearchResponse::deserialize(raw)
            .map_err(|e| SearchIndexError::parse(format!("Invalid search response: {}", e)))?;

        let returned = response.hits.hits.len() as u64;
        let total_hits = match response.hits.total {
            Some(RawTotal::Count(value)) => TotalHits::exact(value),
            Some(RawTotal::Detailed {
                value,
                relation: RawRelation::Eq,
            }) => TotalHits::exact(value),
            Some(RawTotal::Detailed {
                value,
                relation: RawRelation::Gte,
            }) => TotalHits::lower_bound(value),
            None => TotalHits::lower_bound(returned),
        };

        let hits = response
            .hits
            .hits
            .into_iter()
            .map(|hit| Hit {
                id: hit.id,
                index_name: hit.index,
                score: hit.score.filter(|_| scoring),
                fields: hit.source.unwrap_or_default(),
                highlights: hit.highlight.unwrap_or_default(),
            })
            .collect();

        Ok(SearchResult {
            total_hits,
            max_score: response.hits.max_score.filter(|_| scoring),
            hits,
            took_ms: response.took,
            timed_out: response.timed_out,
        })
    }
}
