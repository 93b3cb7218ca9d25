//! Mapping of OpenSearch HTTP responses onto repository types and errors.

use document_search_shared::{
    DeleteByQuerySummary, Document, DocumentWriteResult, StoredDocument, WriteResultKind,
};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::SearchIndexError;

/// Map a non-success HTTP status to an error.
///
/// Throttling and unavailable gateways are retryable, deadline statuses are timeouts,
/// everything else means the request itself was rejected.
pub(crate) fn status_error(status: u16, body: &str) -> SearchIndexError {
    match status {
        408 | 504 => SearchIndexError::timeout(format!("status {}: {}", status, body)),
        429 | 502 | 503 => SearchIndexError::unavailable(format!("status {}: {}", status, body)),
        _ => SearchIndexError::request(status, body),
    }
}

/// Map a transport failure (no HTTP response at all) to an error.
pub(crate) fn transport_error(err: &opensearch::Error) -> SearchIndexError {
    if err.is_timeout() {
        SearchIndexError::timeout(err.to_string())
    } else {
        SearchIndexError::unavailable(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RawWriteResponse {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_version")]
    version: u64,
    result: String,
}

/// Parse the body of an index, update or delete response.
pub(crate) fn parse_write_result(body: &Value) -> Result<DocumentWriteResult, SearchIndexError> {
    let raw = RawWriteResponse::deserialize(body)
        .map_err(|e| SearchIndexError::parse(format!("Invalid write response: {}", e)))?;
    let result = WriteResultKind::parse(&raw.result).ok_or_else(|| {
        SearchIndexError::parse(format!("Unknown write result '{}'", raw.result))
    })?;

    Ok(DocumentWriteResult {
        id: raw.id,
        index_name: raw.index,
        result,
        version: raw.version,
    })
}

#[derive(Debug, Deserialize)]
struct RawGetResponse {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_version", default)]
    version: u64,
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Document>,
}

/// Parse the body of a get response. `found: false` yields `None`.
pub(crate) fn parse_stored_document(
    body: &Value,
) -> Result<Option<StoredDocument>, SearchIndexError> {
    let raw = RawGetResponse::deserialize(body)
        .map_err(|e| SearchIndexError::parse(format!("Invalid get response: {}", e)))?;
    if !raw.found {
        return Ok(None);
    }

    Ok(Some(StoredDocument {
        id: raw.id,
        index_name: raw.index,
        version: raw.version,
        source: raw.source.unwrap_or_default(),
    }))
}

#[derive(Debug, Deserialize)]
struct RawDeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    timed_out: bool,
    #[serde(default)]
    failures: Vec<Value>,
}

/// Parse a delete-by-query report. Each failure entry is kept as its JSON text.
pub(crate) fn parse_delete_by_query(
    body: &Value,
) -> Result<DeleteByQuerySummary, SearchIndexError> {
    let raw = RawDeleteByQueryResponse::deserialize(body)
        .map_err(|e| SearchIndexError::parse(format!("Invalid delete by query response: {}", e)))?;

    Ok(DeleteByQuerySummary {
        deleted: raw.deleted,
        total: raw.total,
        failures: raw
            .failures
            .iter()
            .map(|failure| match failure.pointer("/cause/reason").and_then(Value::as_str) {
                Some(reason) => reason.to_string(),
                None => failure.to_string(),
            })
            .collect(),
        timed_out: raw.timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error_classification() {
        assert!(matches!(status_error(503, ""), SearchIndexError::BackendUnavailable(_)));
        assert!(matches!(status_error(429, ""), SearchIndexError::BackendUnavailable(_)));
        assert!(matches!(status_error(504, ""), SearchIndexError::BackendTimeout(_)));
        assert!(matches!(
            status_error(400, "parsing_exception"),
            SearchIndexError::BackendRequest { status: 400, ref message }
                if message == "parsing_exception"
        ));
        assert!(!status_error(404, "").is_retryable());
        assert!(status_error(502, "").is_retryable());
    }

    #[test]
    fn test_parse_write_result() {
        let body = json!({
            "_index": "docs",
            "_id": "1",
            "_version": 3,
            "result": "updated",
            "_shards": { "total": 2, "successful": 1, "failed": 0 }
        });
        let result = parse_write_result(&body).unwrap();
        assert_eq!(result.id, "1");
        assert_eq!(result.index_name, "docs");
        assert_eq!(result.version, 3);
        assert_eq!(result.result, WriteResultKind::Updated);
    }

    #[test]
    fn test_parse_write_result_unknown_kind() {
        let body = json!({ "_index": "docs", "_id": "1", "_version": 1, "result": "not_found" });
        assert!(matches!(
            parse_write_result(&body),
            Err(SearchIndexError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_stored_document() {
        let found = json!({
            "_index": "docs",
            "_id": "1",
            "_version": 2,
            "found": true,
            "_source": { "name": "kimchy", "price": 3.14 }
        });
        let stored = parse_stored_document(&found).unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.source["name"], json!("kimchy"));

        let missing = json!({ "_index": "docs", "_id": "2", "found": false });
        assert!(parse_stored_document(&missing).unwrap().is_none());
    }

    #[test]
    fn test_parse_delete_by_query() {
        let body = json!({
            "took": 12,
            "timed_out": false,
            "total": 3,
            "deleted": 2,
            "version_conflicts": 1,
            "failures": [
                { "index": "docs", "id": "3", "cause": { "type": "version_conflict_engine_exception", "reason": "[3]: version conflict" } }
            ]
        });
        let summary = parse_delete_by_query(&body).unwrap();
        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failures, vec!["[3]: version conflict"]);
        assert!(summary.is_partial());
    }
}
