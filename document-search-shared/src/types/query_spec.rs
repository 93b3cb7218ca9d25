//! Search request types.
//!
//! A `QuerySpec` bundles the root clause with everything else a search request needs:
//! pagination, source filtering, sorting and highlighting.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::QueryValidationError;
use crate::types::clause::Clause;

/// Default page size, the same as the usual search engine default.
pub const DEFAULT_LIMIT: usize = 10;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// What to sort on: a document field or the relevance score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortField {
    /// The relevance score, spelled `_score`.
    Score,
    Field(String),
}

impl SortField {
    /// Reserved name of the score pseudo-field.
    pub const SCORE: &'static str = "_score";

    pub fn name(&self) -> &str {
        match self {
            SortField::Score => Self::SCORE,
            SortField::Field(name) => name,
        }
    }
}

impl From<String> for SortField {
    fn from(name: String) -> Self {
        if name == Self::SCORE {
            SortField::Score
        } else {
            SortField::Field(name)
        }
    }
}

impl From<&str> for SortField {
    fn from(name: &str) -> Self {
        SortField::from(name.to_string())
    }
}

impl From<SortField> for String {
    fn from(field: SortField) -> Self {
        field.name().to_string()
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the sort order. Earlier entries take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortClause {
    pub fn new(field: impl Into<SortField>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn score(direction: SortDirection) -> Self {
        Self {
            field: SortField::Score,
            direction,
        }
    }
}

/// Which fields to highlight and how to mark the matches.
///
/// Tags left as `None` fall back to the backend defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_tag: Option<String>,
    #[serde(default)]
    pub fields: BTreeSet<String>,
}

impl HighlightRequest {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pre_tag: None,
            post_tag: None,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tags(mut self, pre_tag: impl Into<String>, post_tag: impl Into<String>) -> Self {
        self.pre_tag = Some(pre_tag.into());
        self.post_tag = Some(post_tag.into());
        self
    }
}

/// A complete, backend-agnostic search request.
///
/// Build it with [`QuerySpec::builder`]; once built it is only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Index of the first hit to return.
    #[serde(default)]
    pub offset: usize,
    /// Maximum number of hits to return. Must be positive.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// When not empty, only these source fields are returned.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub fields_included: BTreeSet<String>,
    /// Source fields never returned.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub fields_excluded: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<HighlightRequest>,
    /// Ask the backend for an exact total hit count instead of its default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_total_hits: Option<bool>,
    #[serde(default)]
    pub clause: Clause,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
            fields_included: BTreeSet::new(),
            fields_excluded: BTreeSet::new(),
            sort: Vec::new(),
            highlight: None,
            track_total_hits: None,
            clause: Clause::MatchAll,
        }
    }
}

impl QuerySpec {
    /// Start building a query.
    ///
    /// # Example
    ///
    /// ```
    /// use document_search_shared::{Clause, QuerySpec, SortClause, SortDirection};
    ///
    /// let spec = QuerySpec::builder()
    ///     .page(0, 2)
    ///     .include(["name", "price"])
    ///     .sort(SortClause::new("price", SortDirection::Asc))
    ///     .clause(Clause::term("name", "kimchy"))
    ///     .build()
    ///     .expect("valid query");
    /// assert_eq!(spec.limit, 2);
    /// ```
    pub fn builder() -> QuerySpecBuilder {
        QuerySpecBuilder::default()
    }

    /// A query that returns the first page of hits for a single clause.
    pub fn for_clause(clause: impl Into<Clause>) -> Self {
        Self {
            clause: clause.into(),
            ..Self::default()
        }
    }

    /// Validate pagination, source filtering, highlighting and the clause tree.
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        if self.limit == 0 {
            return Err(QueryValidationError::ZeroLimit);
        }

        if let Some(field) = self.fields_included.intersection(&self.fields_excluded).next() {
            return Err(QueryValidationError::OverlappingSourceField(field.clone()));
        }

        if self
            .fields_included
            .iter()
            .chain(&self.fields_excluded)
            .any(|f| f.trim().is_empty())
        {
            return Err(QueryValidationError::EmptyFieldName("source"));
        }

        if self
            .sort
            .iter()
            .any(|s| matches!(&s.field, SortField::Field(name) if name.trim().is_empty()))
        {
            return Err(QueryValidationError::EmptyFieldName("sort"));
        }

        if let Some(highlight) = &self.highlight {
            if highlight.fields.iter().any(|f| f.trim().is_empty()) {
                return Err(QueryValidationError::EmptyFieldName("highlight"));
            }
        }

        self.clause.validate()
    }
}

/// Fluent builder for [`QuerySpec`].
#[derive(Debug, Clone, Default)]
pub struct QuerySpecBuilder {
    spec: QuerySpec,
}

impl QuerySpecBuilder {
    /// Set the pagination window.
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.spec.offset = offset;
        self.spec.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.spec.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.spec.limit = limit;
        self
    }

    /// Restrict the returned source to these fields.
    pub fn include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .fields_included
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Drop these fields from the returned source.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .fields_excluded
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Append a sort clause.
    pub fn sort(mut self, sort: SortClause) -> Self {
        self.spec.sort.push(sort);
        self
    }

    pub fn highlight(mut self, highlight: HighlightRequest) -> Self {
        self.spec.highlight = Some(highlight);
        self
    }

    pub fn track_total_hits(mut self, exact: bool) -> Self {
        self.spec.track_total_hits = Some(exact);
        self
    }

    pub fn clause(mut self, clause: impl Into<Clause>) -> Self {
        self.spec.clause = clause.into();
        self
    }

    /// Validate and return the query.
    pub fn build(self) -> Result<QuerySpec, QueryValidationError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::clause::{MatchClause, MultiMatchClause};
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let spec = QuerySpec::builder().build().unwrap();
        assert_eq!(spec.offset, 0);
        assert_eq!(spec.limit, DEFAULT_LIMIT);
        assert!(spec.clause.is_match_all());
        assert!(spec.sort.is_empty());
        assert!(spec.highlight.is_none());
    }

    #[test]
    fn test_builder_rejects_zero_limit() {
        let result = QuerySpec::builder().page(0, 0).build();
        assert_eq!(result, Err(QueryValidationError::ZeroLimit));
    }

    #[test]
    fn test_builder_rejects_overlapping_fields() {
        let result = QuerySpec::builder()
            .include(["name", "price"])
            .exclude(["price"])
            .build();
        assert_eq!(
            result,
            Err(QueryValidationError::OverlappingSourceField("price".to_string()))
        );
    }

    #[test]
    fn test_builder_validates_clause() {
        let result = QuerySpec::builder()
            .clause(MatchClause::new("name", "spring").minimum_should_match(150))
            .build();
        assert_eq!(
            result,
            Err(QueryValidationError::MinimumShouldMatchOutOfRange(150))
        );
    }

    #[test]
    fn test_builder_accepts_low_boost() {
        let result = QuerySpec::builder()
            .clause(MultiMatchClause::new("spring", ["name"]).field("name", 0.2))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_sort_field_score_is_reserved() {
        assert_eq!(SortField::from("_score"), SortField::Score);
        assert_eq!(
            SortField::from("price"),
            SortField::Field("price".to_string())
        );
        assert_eq!(SortField::Score.to_string(), "_score");
    }

    #[test]
    fn test_deserialize_query_spec() {
        let spec: QuerySpec = serde_json::from_value(json!({
            "limit": 2,
            "fields_included": ["name", "price"],
            "sort": [
                { "field": "price", "direction": "asc" },
                { "field": "_score", "direction": "desc" }
            ],
            "clause": { "type": "term", "field": "name", "value": "kimchy" }
        }))
        .unwrap();

        assert_eq!(spec.offset, 0);
        assert_eq!(spec.limit, 2);
        assert_eq!(spec.sort[1], SortClause::score(SortDirection::Desc));
        assert_eq!(spec.clause, Clause::term("name", "kimchy"));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_deserialize_defaults_to_match_all() {
        let spec: QuerySpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(spec, QuerySpec::default());
    }
}
