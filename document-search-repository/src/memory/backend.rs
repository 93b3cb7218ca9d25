//! In-memory `SearchBackend`.
//!
//! Interprets the compiled query DSL directly against documents held in process. It
//! answers with the same response shapes as Elasticsearch/OpenSearch, so the normalizer
//! and the DocumentStore run unchanged on top of it. Used by tests and by the
//! `memory` backend of the command runner.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use document_search_shared::{
    DeleteByQuerySummary, Document, DocumentWriteResult, StoredDocument, WriteOutcome,
    WriteResultKind,
};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::evaluator::{self, SourceFilter};
use crate::errors::SearchIndexError;
use crate::interfaces::SearchBackend;
use crate::types::{CompiledQuery, CompiledSearch};

const DEFAULT_SIZE: u64 = 10;
const DEFAULT_PRE_TAG: &str = "<em>";
const DEFAULT_POST_TAG: &str = "</em>";

/// A stored id. Deleted documents keep their version so a later write continues from it.
#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    source: Option<Document>,
}

type Index = BTreeMap<String, Entry>;

/// A search candidate before paging.
struct Candidate<'a> {
    index: &'a str,
    id: &'a str,
    source: &'a Document,
    score: f64,
}

/// Search backend keeping every index in memory.
///
/// Indexes are created implicitly by the first write. Searching or deleting by query
/// on an index that was never written answers with a 404 request error, as a real
/// engine does.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    indexes: RwLock<HashMap<String, Index>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents in an index.
    pub async fn count(&self, index: &str) -> usize {
        self.indexes
            .read()
            .await
            .get(index)
            .map(|docs| docs.values().filter(|e| e.source.is_some()).count())
            .unwrap_or(0)
    }

    fn resolve<'a>(
        indexes: &'a HashMap<String, Index>,
        names: &[String],
    ) -> Result<Vec<(&'a str, &'a Index)>, SearchIndexError> {
        names
            .iter()
            .map(|name| {
                indexes
                    .get_key_value(name)
                    .map(|(k, v)| (k.as_str(), v))
                    .ok_or_else(|| {
                        SearchIndexError::request(404, format!("no such index [{}]", name))
                    })
            })
            .collect()
    }

    /// Every live document matching `query`, with its score, in index then id order.
    fn matching<'a>(
        resolved: &[(&'a str, &'a Index)],
        query: &Value,
    ) -> Result<Vec<Candidate<'a>>, SearchIndexError> {
        let mut candidates = Vec::new();
        for &(index, docs) in resolved {
            for (id, entry) in docs.iter() {
                let Some(source) = &entry.source else {
                    continue;
                };
                if let Some(score) = evaluator::evaluate(query, source)? {
                    candidates.push(Candidate {
                        index,
                        id,
                        source,
                        score,
                    });
                }
            }
        }
        Ok(candidates)
    }

    fn sort_candidates(candidates: &mut [Candidate<'_>], sort: &[(String, bool)], scoring: bool) {
        if sort.is_empty() {
            if scoring {
                candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            }
            return;
        }

        candidates.sort_by(|a, b| {
            for (field, descending) in sort {
                let ordering = if field == "_score" {
                    a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal)
                } else {
                    let left = evaluator::field_values(a.source, field).into_iter().next();
                    let right = evaluator::field_values(b.source, field).into_iter().next();
                    match (left, right) {
                        (Some(l), Some(r)) => {
                            evaluator::compare_values(l, r).unwrap_or(Ordering::Equal)
                        }
                        // Missing values sort last in either direction.
                        (Some(_), None) => return Ordering::Less,
                        (None, Some(_)) => return Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                };
                let ordering = if *descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    fn parse_sort(body: &Value) -> Result<Vec<(String, bool)>, SearchIndexError> {
        let Some(sort) = body.get("sort") else {
            return Ok(Vec::new());
        };
        let entries = sort
            .as_array()
            .ok_or_else(|| SearchIndexError::request(400, "[sort] must be an array"))?;

        entries
            .iter()
            .map(|entry| match entry {
                Value::String(field) => Ok((field.clone(), field == "_score")),
                Value::Object(map) if map.len() == 1 => {
                    let (field, options) = map.iter().next().ok_or_else(|| {
                        SearchIndexError::request(400, "[sort] entry must name a field")
                    })?;
                    let order = options
                        .get("order")
                        .and_then(Value::as_str)
                        .or_else(|| options.as_str())
                        .unwrap_or(if field == "_score" { "desc" } else { "asc" });
                    Ok((field.clone(), order.eq_ignore_ascii_case("desc")))
                }
                _ => Err(SearchIndexError::request(400, "[sort] malformed entry")),
            })
            .collect()
    }

    fn highlight(
        highlight: &Value,
        terms: &BTreeMap<String, HashSet<String>>,
        source: &Document,
    ) -> Map<String, Value> {
        let tag = |key: &str, default: &str| {
            highlight
                .get(key)
                .and_then(|tags| tags.get(0))
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        let pre_tag = tag("pre_tags", DEFAULT_PRE_TAG);
        let post_tag = tag("post_tags", DEFAULT_POST_TAG);

        let mut fragments = Map::new();
        let fields = highlight.get("fields").and_then(Value::as_object);
        for field in fields.into_iter().flat_map(|f| f.keys()) {
            let Some(tokens) = terms.get(field) else {
                continue;
            };
            let highlighted: Vec<Value> = evaluator::field_values(source, field)
                .into_iter()
                .filter_map(Value::as_str)
                .filter_map(|text| evaluator::highlight_text(text, tokens, &pre_tag, &post_tag))
                .map(Value::String)
                .collect();
            if !highlighted.is_empty() {
                fragments.insert(field.clone(), Value::Array(highlighted));
            }
        }
        fragments
    }

    fn write_result(
        index: &str,
        id: &str,
        result: WriteResultKind,
        version: u64,
    ) -> DocumentWriteResult {
        DocumentWriteResult {
            id: id.to_string(),
            index_name: index.to_string(),
            result,
            version,
        }
    }
}

/// Merge `partial` into `target` recursively. Returns whether anything changed.
fn deep_merge(target: &mut Document, partial: &Document) -> bool {
    let mut changed = false;
    for (key, value) in partial {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(update)) => {
                changed |= deep_merge(existing, update);
            }
            (Some(existing), _) if existing == value => {}
            _ => {
                target.insert(key.clone(), value.clone());
                changed = true;
            }
        }
    }
    changed
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn ping(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn execute(
        &self,
        indexes: &[String],
        request: &CompiledSearch,
    ) -> Result<Value, SearchIndexError> {
        let body = request.body();
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(DEFAULT_SIZE) as usize;
        let query = body.get("query").cloned().unwrap_or_else(|| json!({ "match_all": {} }));
        let sort = Self::parse_sort(body)?;
        let source_filter = SourceFilter::parse(body.get("_source"));
        let track_total_hits = body
            .get("track_total_hits")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let guard = self.indexes.read().await;
        let resolved = Self::resolve(&guard, indexes)?;
        let mut candidates = Self::matching(&resolved, &query)?;

        let scoring = evaluator::is_scoring(&query);
        Self::sort_candidates(&mut candidates, &sort, scoring);

        let report_scores = scoring && (sort.is_empty() || sort.iter().any(|(f, _)| f == "_score"));
        let max_score = candidates
            .iter()
            .map(|c| c.score)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |m| m.max(s))));

        let terms = body
            .get("highlight")
            .map(|_| evaluator::highlight_terms(&query))
            .unwrap_or_default();

        let total = candidates.len();
        let hits: Vec<Value> = candidates
            .iter()
            .skip(from)
            .take(size)
            .map(|candidate| {
                let mut hit = json!({
                    "_index": candidate.index,
                    "_id": candidate.id,
                    "_score": if report_scores { json!(candidate.score) } else { Value::Null },
                });
                hit["_source"] = Value::Object(source_filter.apply(candidate.source));
                if let Some(highlight) = body.get("highlight") {
                    let fragments = Self::highlight(highlight, &terms, candidate.source);
                    if !fragments.is_empty() {
                        hit["highlight"] = Value::Object(fragments);
                    }
                }
                hit
            })
            .collect();

        debug!(
            indexes = ?indexes,
            total = total,
            returned = hits.len(),
            "In-memory search executed"
        );

        let mut hits_section = json!({
            "max_score": if report_scores { json!(max_score) } else { Value::Null },
            "hits": hits,
        });
        if track_total_hits {
            hits_section["total"] = json!({ "value": total, "relation": "eq" });
        }

        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": hits_section,
        }))
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<DocumentWriteResult, SearchIndexError> {
        let mut guard = self.indexes.write().await;
        let docs = guard.entry(index.to_string()).or_default();

        let (result, version) = match docs.get_mut(id) {
            Some(entry) => {
                let result = if entry.source.is_some() {
                    WriteResultKind::Updated
                } else {
                    WriteResultKind::Created
                };
                entry.version += 1;
                entry.source = Some(document.clone());
                (result, entry.version)
            }
            None => {
                docs.insert(
                    id.to_string(),
                    Entry {
                        version: 1,
                        source: Some(document.clone()),
                    },
                );
                (WriteResultKind::Created, 1)
            }
        };

        Ok(Self::write_result(index, id, result, version))
    }

    async fn get_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, SearchIndexError> {
        let guard = self.indexes.read().await;
        let stored = guard
            .get(index)
            .and_then(|docs| docs.get(id))
            .and_then(|entry| {
                entry.source.as_ref().map(|source| StoredDocument {
                    id: id.to_string(),
                    index_name: index.to_string(),
                    version: entry.version,
                    source: source.clone(),
                })
            });
        Ok(stored)
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Document,
    ) -> Result<WriteOutcome, SearchIndexError> {
        let mut guard = self.indexes.write().await;
        let Some(entry) = guard.get_mut(index).and_then(|docs| docs.get_mut(id)) else {
            return Ok(WriteOutcome::NotFound);
        };
        let Some(source) = entry.source.as_mut() else {
            return Ok(WriteOutcome::NotFound);
        };

        let result = if deep_merge(source, partial) {
            entry.version += 1;
            WriteResultKind::Updated
        } else {
            WriteResultKind::Noop
        };

        Ok(WriteOutcome::Written(Self::write_result(
            index,
            id,
            result,
            entry.version,
        )))
    }

    async fn delete_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<WriteOutcome, SearchIndexError> {
        let mut guard = self.indexes.write().await;
        let Some(entry) = guard.get_mut(index).and_then(|docs| docs.get_mut(id)) else {
            return Ok(WriteOutcome::NotFound);
        };
        if entry.source.take().is_none() {
            return Ok(WriteOutcome::NotFound);
        }
        entry.version += 1;

        Ok(WriteOutcome::Written(Self::write_result(
            index,
            id,
            WriteResultKind::Deleted,
            entry.version,
        )))
    }

    async fn delete_by_query(
        &self,
        indexes: &[String],
        query: &CompiledQuery,
    ) -> Result<DeleteByQuerySummary, SearchIndexError> {
        let mut guard = self.indexes.write().await;

        let targets: Vec<(String, String)> = {
            let resolved = Self::resolve(&guard, indexes)?;
            Self::matching(&resolved, query.query())?
                .into_iter()
                .map(|c| (c.index.to_string(), c.id.to_string()))
                .collect()
        };

        let mut deleted = 0;
        for (index, id) in &targets {
            if let Some(entry) = guard.get_mut(index).and_then(|docs| docs.get_mut(id)) {
                if entry.source.take().is_some() {
                    entry.version += 1;
                    deleted += 1;
                }
            }
        }

        debug!(indexes = ?indexes, deleted = deleted, "In-memory delete by query");

        Ok(DeleteByQuerySummary {
            deleted,
            total: targets.len() as u64,
            failures: Vec::new(),
            timed_out: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    fn search(body: Value) -> CompiledSearch {
        CompiledSearch::from_value(body)
    }

    #[tokio::test]
    async fn test_versions_are_monotonic_across_delete() {
        let backend = InMemoryBackend::new();
        let d = doc(json!({ "name": "kimchy" }));

        let first = backend.index_document("docs", "1", &d).await.unwrap();
        assert_eq!((first.result, first.version), (WriteResultKind::Created, 1));

        let second = backend.index_document("docs", "1", &d).await.unwrap();
        assert_eq!((second.result, second.version), (WriteResultKind::Updated, 2));

        let deleted = backend.delete_document("docs", "1").await.unwrap();
        assert_eq!(deleted.written().map(|w| w.version), Some(3));
        assert!(backend.get_document("docs", "1").await.unwrap().is_none());

        let recreated = backend.index_document("docs", "1", &d).await.unwrap();
        assert_eq!((recreated.result, recreated.version), (WriteResultKind::Created, 4));
    }

    #[tokio::test]
    async fn test_update_merges_and_detects_noop() {
        let backend = InMemoryBackend::new();
        backend
            .index_document("docs", "1", &doc(json!({ "name": "a", "meta": { "x": 1, "y": 2 } })))
            .await
            .unwrap();

        let outcome = backend
            .update_document("docs", "1", &doc(json!({ "meta": { "y": 3 } })))
            .await
            .unwrap();
        assert_eq!(outcome.written().map(|w| w.result), Some(WriteResultKind::Updated));

        let stored = backend.get_document("docs", "1").await.unwrap().unwrap();
        assert_eq!(stored.source["meta"], json!({ "x": 1, "y": 3 }));
        assert_eq!(stored.source["name"], json!("a"));

        let noop = backend
            .update_document("docs", "1", &doc(json!({ "name": "a" })))
            .await
            .unwrap();
        assert_eq!(noop.written().map(|w| (w.result, w.version)), Some((WriteResultKind::Noop, 2)));
    }

    #[tokio::test]
    async fn test_missing_documents_are_not_found() {
        let backend = InMemoryBackend::new();
        assert!(backend.get_document("docs", "1").await.unwrap().is_none());
        assert!(backend.delete_document("docs", "1").await.unwrap().is_not_found());
        assert!(backend
            .update_document("docs", "1", &doc(json!({ "a": 1 })))
            .await
            .unwrap()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_search_unknown_index_is_404() {
        let backend = InMemoryBackend::new();
        let err = backend
            .execute(&["missing".to_string()], &search(json!({ "query": { "match_all": {} } })))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchIndexError::BackendRequest { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_search_paging_sort_and_source() {
        let backend = InMemoryBackend::new();
        for (id, price) in [("a", 3), ("b", 1), ("c", 2)] {
            backend
                .index_document("docs", id, &doc(json!({ "price": price, "pic": "x" })))
                .await
                .unwrap();
        }

        let response = backend
            .execute(
                &["docs".to_string()],
                &search(json!({
                    "from": 1,
                    "size": 1,
                    "query": { "match_all": {} },
                    "sort": [{ "price": { "order": "desc" } }],
                    "_source": { "includes": [], "excludes": ["pic"] }
                })),
            )
            .await
            .unwrap();

        assert_eq!(response["hits"]["total"], json!({ "value": 3, "relation": "eq" }));
        assert_eq!(response["hits"]["max_score"], Value::Null);
        let hits = response["hits"]["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["_id"], json!("c"));
        assert_eq!(hits[0]["_score"], Value::Null);
        assert_eq!(hits[0]["_source"], json!({ "price": 2 }));
    }

    #[tokio::test]
    async fn test_delete_by_query_tombstones_matches() {
        let backend = InMemoryBackend::new();
        for (id, model) in [("1", "201001"), ("2", "201002"), ("3", "201001")] {
            backend
                .index_document("docs", id, &doc(json!({ "studymodel": model })))
                .await
                .unwrap();
        }

        let query = json!({ "term": { "studymodel": { "value": "201001" } } });
        let summary = backend
            .delete_by_query(&["docs".to_string()], &CompiledQuery::from_value(query))
            .await
            .unwrap();

        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.total, 2);
        assert!(!summary.is_partial());
        assert_eq!(backend.count("docs").await, 1);
    }
}
