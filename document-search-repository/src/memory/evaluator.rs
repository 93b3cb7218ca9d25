//! Query DSL interpreter for the in-memory backend.
//!
//! Understands the primitives emitted by `QueryCompiler` and scores documents with a
//! deliberately simple model: a text match scores the number of distinct query tokens
//! found, multiplied by the field boost; exact, range and match-all clauses score 1;
//! a `bool` sums its `must` and `should` scores; `filter` and `must_not` never score.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use document_search_shared::Document;
use serde_json::{Map, Value};

use super::tokenizer::{token_spans, tokenize};
use crate::errors::SearchIndexError;

/// Evaluate `query` against a document source.
///
/// Returns `Ok(None)` when the document does not match, `Ok(Some(score))` otherwise.
pub(crate) fn evaluate(query: &Value, doc: &Document) -> Result<Option<f64>, SearchIndexError> {
    let (kind, params) = single_entry(query)?;
    match kind {
        "match_all" => Ok(Some(1.0)),
        "term" => evaluate_term(params, doc),
        "match" => evaluate_match(params, doc),
        "multi_match" => evaluate_multi_match(params, doc),
        "range" => evaluate_range(params, doc),
        "bool" => evaluate_bool(params, doc),
        other => Err(SearchIndexError::unsupported_clause(format!(
            "in-memory backend cannot evaluate '{}' queries",
            other
        ))),
    }
}

/// Whether the query computes relevance at all.
///
/// A query made only of filter and exclusion clauses does not.
pub(crate) fn is_scoring(query: &Value) -> bool {
    let Ok((kind, params)) = single_entry(query) else {
        return false;
    };
    if kind != "bool" {
        return true;
    }
    ["must", "should"]
        .iter()
        .flat_map(|key| clause_list(params.get(*key)))
        .any(is_scoring)
}

/// Query tokens per field, used to highlight matches.
///
/// Clauses under `must_not` are ignored, everything else contributes.
pub(crate) fn highlight_terms(query: &Value) -> BTreeMap<String, HashSet<String>> {
    let mut terms = BTreeMap::new();
    collect_highlight_terms(query, &mut terms);
    terms
}

/// Wrap every highlighted token of `text` in tags.
///
/// Returns `None` when nothing in the text matches.
pub(crate) fn highlight_text(
    text: &str,
    tokens: &HashSet<String>,
    pre_tag: &str,
    post_tag: &str,
) -> Option<String> {
    let mut fragment = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut highlighted = false;

    for span in token_spans(text) {
        if tokens.contains(&span.token) {
            fragment.push_str(&text[cursor..span.start]);
            fragment.push_str(pre_tag);
            fragment.push_str(&text[span.start..span.end]);
            fragment.push_str(post_tag);
            cursor = span.end;
            highlighted = true;
        }
    }

    if !highlighted {
        return None;
    }
    fragment.push_str(&text[cursor..]);
    Some(fragment)
}

/// All values found at a dotted field path, with arrays flattened.
pub(crate) fn field_values<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&Value> = Vec::new();
    let mut segments = path.split('.');
    if let Some(first) = segments.next() {
        if let Some(value) = doc.get(first) {
            current.push(value);
        }
    }

    for segment in segments {
        current = flatten(current)
            .into_iter()
            .filter_map(|v| v.as_object().and_then(|o| o.get(segment)))
            .collect();
    }

    flatten(current)
}

/// Compare two field values: numbers numerically, strings lexically, booleans by value.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn flatten(values: Vec<&Value>) -> Vec<&Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Array(items) => out.extend(flatten(items.iter().collect())),
            Value::Null => {}
            other => out.push(other),
        }
    }
    out
}

fn single_entry(query: &Value) -> Result<(&str, &Value), SearchIndexError> {
    let object = query
        .as_object()
        .ok_or_else(|| SearchIndexError::request(400, "query must be a JSON object"))?;
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some((kind, params)), None) => Ok((kind.as_str(), params)),
        _ => Err(SearchIndexError::request(
            400,
            format!("query must have exactly one key, got {}", object.len()),
        )),
    }
}

/// The single `{field: params}` entry of a field-level query.
fn field_entry<'a>(
    kind: &str,
    params: &'a Value,
) -> Result<(&'a str, &'a Value), SearchIndexError> {
    single_entry(params).map_err(|_| {
        SearchIndexError::request(400, format!("[{}] query requires exactly one field", kind))
    })
}

fn clause_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn evaluate_term(params: &Value, doc: &Document) -> Result<Option<f64>, SearchIndexError> {
    let (field, spec) = field_entry("term", params)?;
    let expected = spec.get("value").unwrap_or(spec);
    let matched = field_values(doc, field)
        .into_iter()
        .any(|v| values_equal(v, expected));
    Ok(matched.then_some(1.0))
}

/// How many distinct query tokens must be present for a text match.
fn required_matches(
    token_count: usize,
    operator: &str,
    minimum_should_match: Option<&Value>,
) -> usize {
    if operator.eq_ignore_ascii_case("and") {
        return token_count;
    }
    let percent = minimum_should_match
        .and_then(|v| match v {
            Value::String(s) => s.trim_end_matches('%').trim().parse::<f64>().ok(),
            Value::Number(n) => n.as_f64().map(|count| count / token_count.max(1) as f64 * 100.0),
            _ => None,
        })
        .unwrap_or(0.0);
    let required = (token_count as f64 * percent / 100.0).floor() as usize;
    required.clamp(1, token_count.max(1))
}

fn distinct_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn field_tokens(doc: &Document, field: &str) -> HashSet<String> {
    field_values(doc, field)
        .into_iter()
        .flat_map(|value| match value {
            Value::String(s) => tokenize(s),
            Value::Number(n) => tokenize(&n.to_string()),
            Value::Bool(b) => vec![b.to_string()],
            _ => Vec::new(),
        })
        .collect()
}

/// Number of query tokens present in the field, if enough of them are.
fn text_match(
    query_tokens: &[String],
    doc: &Document,
    field: &str,
    required: usize,
) -> Option<usize> {
    if query_tokens.is_empty() {
        return None;
    }
    let present = field_tokens(doc, field);
    let matched = query_tokens.iter().filter(|t| present.contains(*t)).count();
    (matched >= required).then_some(matched)
}

fn evaluate_match(params: &Value, doc: &Document) -> Result<Option<f64>, SearchIndexError> {
    let (field, spec) = field_entry("match", params)?;
    let (text, operator, minimum_should_match) = match spec {
        Value::String(text) => (text.as_str(), "or", None),
        Value::Object(options) => (
            options
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchIndexError::request(400, "[match] requires a query string"))?,
            options.get("operator").and_then(Value::as_str).unwrap_or("or"),
            options.get("minimum_should_match"),
        ),
        _ => return Err(SearchIndexError::request(400, "[match] malformed query")),
    };

    let tokens = distinct_tokens(text);
    let required = required_matches(tokens.len(), operator, minimum_should_match);
    Ok(text_match(&tokens, doc, field, required).map(|matched| matched as f64))
}

/// Split `name^boost` into its parts.
fn parse_boosted_field(raw: &str) -> Result<(&str, f64), SearchIndexError> {
    match raw.split_once('^') {
        Some((field, boost)) => boost
            .parse::<f64>()
            .map(|b| (field, b))
            .map_err(|_| SearchIndexError::request(400, format!("invalid boost in '{}'", raw))),
        None => Ok((raw, 1.0)),
    }
}

fn evaluate_multi_match(params: &Value, doc: &Document) -> Result<Option<f64>, SearchIndexError> {
    let text = params
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| SearchIndexError::request(400, "[multi_match] requires a query string"))?;
    let fields = params
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchIndexError::request(400, "[multi_match] requires fields"))?;
    let operator = params.get("operator").and_then(Value::as_str).unwrap_or("or");

    let tokens = distinct_tokens(text);
    let required = required_matches(tokens.len(), operator, params.get("minimum_should_match"));

    let mut best: Option<f64> = None;
    for field in fields {
        let raw = field
            .as_str()
            .ok_or_else(|| SearchIndexError::request(400, "[multi_match] fields must be strings"))?;
        let (name, boost) = parse_boosted_field(raw)?;
        if let Some(matched) = text_match(&tokens, doc, name, required) {
            let score = matched as f64 * boost;
            best = Some(best.map_or(score, |b| b.max(score)));
        }
    }
    Ok(best)
}

fn evaluate_range(params: &Value, doc: &Document) -> Result<Option<f64>, SearchIndexError> {
    let (field, bounds) = field_entry("range", params)?;
    let bounds = bounds
        .as_object()
        .ok_or_else(|| SearchIndexError::request(400, "[range] bounds must be an object"))?;

    let within = |value: &Value| {
        bounds.iter().all(|(op, bound)| {
            let ordering = compare_values(value, bound);
            match op.as_str() {
                "gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                "gt" => matches!(ordering, Some(Ordering::Greater)),
                "lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                "lt" => matches!(ordering, Some(Ordering::Less)),
                _ => true,
            }
        })
    };

    let matched = field_values(doc, field).into_iter().any(within);
    Ok(matched.then_some(1.0))
}

fn evaluate_bool(params: &Value, doc: &Document) -> Result<Option<f64>, SearchIndexError> {
    let must = clause_list(params.get("must"));
    let filter = clause_list(params.get("filter"));
    let must_not = clause_list(params.get("must_not"));
    let should = clause_list(params.get("should"));

    let mut score = 0.0;
    for clause in &must {
        match evaluate(clause, doc)? {
            Some(s) => score += s,
            None => return Ok(None),
        }
    }
    for clause in &filter {
        if evaluate(clause, doc)?.is_none() {
            return Ok(None);
        }
    }
    for clause in &must_not {
        if evaluate(clause, doc)?.is_some() {
            return Ok(None);
        }
    }

    let mut should_matched = 0;
    for clause in &should {
        if let Some(s) = evaluate(clause, doc)? {
            score += s;
            should_matched += 1;
        }
    }

    let minimum_should = match params.get("minimum_should_match").and_then(Value::as_u64) {
        Some(n) => n as usize,
        None if must.is_empty() && filter.is_empty() && !should.is_empty() => 1,
        None => 0,
    };
    if should_matched < minimum_should {
        return Ok(None);
    }

    Ok(Some(score))
}

fn collect_highlight_terms(query: &Value, terms: &mut BTreeMap<String, HashSet<String>>) {
    let Ok((kind, params)) = single_entry(query) else {
        return;
    };
    match kind {
        "term" | "match" => {
            if let Ok((field, spec)) = field_entry(kind, params) {
                let text = match spec {
                    Value::Object(options) => options.get("query").or_else(|| options.get("value")),
                    other => Some(other),
                };
                if let Some(Value::String(text)) = text {
                    terms
                        .entry(field.to_string())
                        .or_default()
                        .extend(tokenize(text));
                }
            }
        }
        "multi_match" => {
            let text = params.get("query").and_then(Value::as_str).unwrap_or_default();
            let fields = params.get("fields").and_then(Value::as_array);
            for raw in fields.into_iter().flatten().filter_map(Value::as_str) {
                if let Ok((field, _)) = parse_boosted_field(raw) {
                    terms
                        .entry(field.to_string())
                        .or_default()
                        .extend(tokenize(text));
                }
            }
        }
        "bool" => {
            for key in ["must", "filter", "should"] {
                for clause in clause_list(params.get(key)) {
                    collect_highlight_terms(clause, terms);
                }
            }
        }
        _ => {}
    }
}

/// Source filtering requested by the `_source` key of a search body.
#[derive(Debug, Default)]
pub(crate) struct SourceFilter {
    includes: BTreeSet<String>,
    excludes: BTreeSet<String>,
}

impl SourceFilter {
    pub(crate) fn parse(value: Option<&Value>) -> Self {
        let names = |v: Option<&Value>| -> BTreeSet<String> {
            match v {
                Some(Value::String(s)) => BTreeSet::from([s.clone()]),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => BTreeSet::new(),
            }
        };

        match value {
            Some(Value::Object(options)) => Self {
                includes: names(options.get("includes")),
                excludes: names(options.get("excludes")),
            },
            other => Self {
                includes: names(other),
                excludes: BTreeSet::new(),
            },
        }
    }

    /// Apply the filter to a document's top-level fields.
    pub(crate) fn apply(&self, source: &Document) -> Map<String, Value> {
        source
            .iter()
            .filter(|(key, _)| self.includes.is_empty() || self.includes.contains(*key))
            .filter(|(key, _)| !self.excludes.contains(*key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
