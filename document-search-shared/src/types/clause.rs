//! Query clause types.
//!
//! A `Clause` is the backend-agnostic description of *what* a caller is looking for.
//! Compilers translate it into a concrete query language; nothing in here knows about
//! any particular search engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::QueryValidationError;

/// A single node of a query tree.
///
/// The variant set is closed on purpose: translators match on it exhaustively, so
/// adding a variant is a compile error everywhere a translation is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Clause {
    /// Matches every document.
    #[default]
    MatchAll,
    /// Exact match on a field value, no tokenization.
    Term(TermClause),
    /// Tokenized full-text match on a single field.
    Match(MatchClause),
    /// Tokenized full-text match across several (boosted) fields.
    MultiMatch(MultiMatchClause),
    /// Bounded range on a field.
    Range(RangeClause),
    /// Boolean combination of other clauses.
    Bool(BoolClause),
}

impl Clause {
    /// A clause matching every document.
    pub fn match_all() -> Self {
        Clause::MatchAll
    }

    /// Exact-match clause.
    ///
    /// # Example
    ///
    /// ```
    /// use document_search_shared::Clause;
    ///
    /// let clause = Clause::term("name", "kimchy");
    /// assert!(clause.validate().is_ok());
    /// ```
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Term(TermClause {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Full-text match on one field with the default `or` operator.
    pub fn matches(field: impl Into<String>, text: impl Into<String>) -> Self {
        Clause::Match(MatchClause::new(field, text))
    }

    /// Full-text match across several fields, each with boost 1.
    pub fn multi_match<I, S>(text: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Clause::MultiMatch(MultiMatchClause::new(text, fields))
    }

    /// Unbounded range on a field; add bounds with `gte`/`gt`/`lte`/`lt` on the payload.
    pub fn range(field: impl Into<String>) -> RangeClause {
        RangeClause::new(field)
    }

    /// Returns true when the clause matches everything, either explicitly or as an
    /// empty boolean combination.
    pub fn is_match_all(&self) -> bool {
        match self {
            Clause::MatchAll => true,
            Clause::Bool(bool_clause) => bool_clause.is_empty(),
            _ => false,
        }
    }

    /// Returns true when the clause contributes to relevance.
    ///
    /// A non-empty `bool` scores only through a scoring `must` or `should` child; one
    /// made only of `filter` and `must_not` clauses computes no score at all.
    pub fn is_scoring(&self) -> bool {
        match self {
            Clause::Bool(bool_clause) if !bool_clause.is_empty() => bool_clause
                .must
                .iter()
                .chain(&bool_clause.should)
                .any(Clause::is_scoring),
            _ => true,
        }
    }

    /// Validate this clause and every nested clause.
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        match self {
            Clause::MatchAll => Ok(()),
            Clause::Term(term) => require_field(&term.field, "term"),
            Clause::Match(match_clause) => {
                require_field(&match_clause.field, "match")?;
                validate_minimum_should_match(match_clause.minimum_should_match)
            }
            Clause::MultiMatch(multi) => {
                if multi.fields.is_empty() {
                    return Err(QueryValidationError::EmptyMultiMatchFields);
                }
                for field in &multi.fields {
                    require_field(&field.field, "multi_match")?;
                    if !field.boost.is_finite() || field.boost <= 0.0 {
                        return Err(QueryValidationError::InvalidBoost {
                            field: field.field.clone(),
                            boost: field.boost,
                        });
                    }
                }
                validate_minimum_should_match(multi.minimum_should_match)
            }
            Clause::Range(range) => require_field(&range.field, "range"),
            Clause::Bool(bool_clause) => bool_clause
                .must
                .iter()
                .chain(&bool_clause.filter)
                .chain(&bool_clause.must_not)
                .chain(&bool_clause.should)
                .try_for_each(Clause::validate),
        }
    }
}

fn require_field(field: &str, clause: &'static str) -> Result<(), QueryValidationError> {
    if field.trim().is_empty() {
        return Err(QueryValidationError::EmptyFieldName(clause));
    }
    Ok(())
}

fn validate_minimum_should_match(value: Option<u8>) -> Result<(), QueryValidationError> {
    match value {
        Some(percent) if percent > 100 => {
            Err(QueryValidationError::MinimumShouldMatchOutOfRange(percent))
        }
        _ => Ok(()),
    }
}

/// Exact match on a field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermClause {
    pub field: String,
    pub value: Value,
}

/// How the tokens of a full-text match combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    /// Every token must match.
    And,
    /// At least one token must match.
    #[default]
    Or,
}

impl MatchOperator {
    /// Lower-case name as used by query languages.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOperator::And => "and",
            MatchOperator::Or => "or",
        }
    }
}

/// Tokenized full-text match on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClause {
    pub field: String,
    pub text: String,
    #[serde(default)]
    pub operator: MatchOperator,
    /// Share of query tokens (percent) that must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u8>,
}

impl MatchClause {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
            operator: MatchOperator::default(),
            minimum_should_match: None,
        }
    }

    pub fn operator(mut self, operator: MatchOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn minimum_should_match(mut self, percent: u8) -> Self {
        self.minimum_should_match = Some(percent);
        self
    }
}

impl From<MatchClause> for Clause {
    fn from(clause: MatchClause) -> Self {
        Clause::Match(clause)
    }
}

fn default_boost() -> f64 {
    1.0
}

/// A field taking part in a multi-field match, with its relative weight.
///
/// A boost below 1 is accepted and de-prioritizes the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBoost {
    pub field: String,
    #[serde(default = "default_boost")]
    pub boost: f64,
}

impl FieldBoost {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            boost: default_boost(),
        }
    }

    pub fn boosted(field: impl Into<String>, boost: f64) -> Self {
        Self {
            field: field.into(),
            boost,
        }
    }
}

/// Tokenized full-text match across several fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMatchClause {
    pub text: String,
    pub fields: Vec<FieldBoost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u8>,
}

impl MultiMatchClause {
    /// Create a multi-field match over the given fields, each with boost 1.
    pub fn new<I, S>(text: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.into(),
            fields: fields.into_iter().map(FieldBoost::new).collect(),
            minimum_should_match: None,
        }
    }

    /// Set the boost of a field, adding the field if it is not searched yet.
    pub fn field(mut self, field: impl Into<String>, boost: f64) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|f| f.field == field) {
            Some(existing) => existing.boost = boost,
            None => self.fields.push(FieldBoost::boosted(field, boost)),
        }
        self
    }

    pub fn minimum_should_match(mut self, percent: u8) -> Self {
        self.minimum_should_match = Some(percent);
        self
    }
}

impl From<MultiMatchClause> for Clause {
    fn from(clause: MultiMatchClause) -> Self {
        Clause::MultiMatch(clause)
    }
}

fn default_inclusive() -> bool {
    true
}

/// Range restriction on a field. Missing bounds are open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeClause {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<Value>,
    #[serde(default = "default_inclusive")]
    pub include_lower: bool,
    #[serde(default = "default_inclusive")]
    pub include_upper: bool,
}

impl RangeClause {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            lower: None,
            upper: None,
            include_lower: true,
            include_upper: true,
        }
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.lower = Some(value.into());
        self.include_lower = true;
        self
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.lower = Some(value.into());
        self.include_lower = false;
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.upper = Some(value.into());
        self.include_upper = true;
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.upper = Some(value.into());
        self.include_upper = false;
        self
    }
}

impl From<RangeClause> for Clause {
    fn from(clause: RangeClause) -> Self {
        Clause::Range(clause)
    }
}

/// Boolean combination of clauses.
///
/// `must` and `should` contribute to relevance; `filter` and `must_not` only decide
/// whether a document matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolClause {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Clause>,
}

impl BoolClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, clause: impl Into<Clause>) -> Self {
        self.must.push(clause.into());
        self
    }

    pub fn filter(mut self, clause: impl Into<Clause>) -> Self {
        self.filter.push(clause.into());
        self
    }

    pub fn must_not(mut self, clause: impl Into<Clause>) -> Self {
        self.must_not.push(clause.into());
        self
    }

    pub fn should(mut self, clause: impl Into<Clause>) -> Self {
        self.should.push(clause.into());
        self
    }

    /// A boolean clause without any sub-clause is equivalent to match-all.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.filter.is_empty()
            && self.must_not.is_empty()
            && self.should.is_empty()
    }
}

impl From<BoolClause> for Clause {
    fn from(clause: BoolClause) -> Self {
        Clause::Bool(clause)
    }
}
