//! Query compiler.
//!
//! Translates the backend-agnostic `QuerySpec` / `Clause` model into the JSON query
//! DSL understood by Elasticsearch and OpenSearch.
//!
//! The translation is a structural recursion over `Clause`. The match is exhaustive
//! with no fallback arm, so a new clause kind cannot compile until it has a translation.
//! `filter` sub-clauses are always emitted under the `filter` key of a `bool` query,
//! which the engine evaluates without scoring.

use document_search_shared::{
    BoolClause, Clause, HighlightRequest, MatchClause, MultiMatchClause, QuerySpec, RangeClause,
    SortClause, TermClause,
};
use serde_json::{json, Map, Value};

use crate::types::{CompiledQuery, CompiledSearch};

/// Stateless compiler from `QuerySpec` to query DSL.
pub struct QueryCompiler;

impl QueryCompiler {
    /// Compile a full search request.
    ///
    /// The `QuerySpec` is expected to be validated already; compilation itself cannot fail.
    pub fn compile_search(spec: &QuerySpec) -> CompiledSearch {
        let mut body = json!({
            "from": spec.offset,
            "size": spec.limit,
            "query": Self::clause(&spec.clause),
        });

        if let Some(source) = Self::source_argument(spec) {
            body["_source"] = source;
        }

        if !spec.sort.is_empty() {
            body["sort"] = Self::sort_argument(&spec.sort);
        }

        if let Some(highlight) = &spec.highlight {
            body["highlight"] = Self::highlight_argument(highlight);
        }

        if let Some(track_total_hits) = spec.track_total_hits {
            body["track_total_hits"] = json!(track_total_hits);
        }

        CompiledSearch::from_value(body)
    }

    /// Compile a bare query, as used by delete-by-query.
    pub fn compile_query(clause: &Clause) -> CompiledQuery {
        CompiledQuery::from_value(Self::clause(clause))
    }

    fn clause(clause: &Clause) -> Value {
        match clause {
            Clause::MatchAll => Self::match_all(),
            Clause::Term(term) => Self::term(term),
            Clause::Match(match_clause) => Self::match_query(match_clause),
            Clause::MultiMatch(multi) => Self::multi_match(multi),
            Clause::Range(range) => Self::range(range),
            Clause::Bool(bool_clause) => Self::bool_query(bool_clause),
        }
    }

    fn match_all() -> Value {
        json!({ "match_all": {} })
    }

    fn term(term: &TermClause) -> Value {
        json!({
            "term": {
                term.field.as_str(): { "value": term.value }
            }
        })
    }

    fn match_query(clause: &MatchClause) -> Value {
        let mut params = json!({
            "query": clause.text,
            "operator": clause.operator.as_str(),
        });
        if let Some(percent) = clause.minimum_should_match {
            params["minimum_should_match"] = json!(Self::percent(percent));
        }

        json!({
            "match": {
                clause.field.as_str(): params
            }
        })
    }

    fn multi_match(clause: &MultiMatchClause) -> Value {
        let fields: Vec<String> = clause
            .fields
            .iter()
            .map(|f| Self::boosted_field(&f.field, f.boost))
            .collect();

        let mut params = json!({
            "query": clause.text,
            "fields": fields,
        });
        if let Some(percent) = clause.minimum_should_match {
            params["minimum_should_match"] = json!(Self::percent(percent));
        }

        json!({ "multi_match": params })
    }

    fn range(clause: &RangeClause) -> Value {
        let mut bounds = Map::new();
        if let Some(lower) = &clause.lower {
            let key = if clause.include_lower { "gte" } else { "gt" };
            bounds.insert(key.to_string(), lower.clone());
        }
        if let Some(upper) = &clause.upper {
            let key = if clause.include_upper { "lte" } else { "lt" };
            bounds.insert(key.to_string(), upper.clone());
        }

        json!({
            "range": {
                clause.field.as_str(): bounds
            }
        })
    }

    fn bool_query(clause: &BoolClause) -> Value {
        if clause.is_empty() {
            return Self::match_all();
        }

        let mut params = Map::new();
        for (key, clauses) in [
            ("must", &clause.must),
            ("filter", &clause.filter),
            ("must_not", &clause.must_not),
            ("should", &clause.should),
        ] {
            if !clauses.is_empty() {
                params.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(Self::clause).collect()),
                );
            }
        }

        json!({ "bool": params })
    }

    fn source_argument(spec: &QuerySpec) -> Option<Value> {
        if spec.fields_included.is_empty() && spec.fields_excluded.is_empty() {
            return None;
        }
        Some(json!({
            "includes": spec.fields_included,
            "excludes": spec.fields_excluded,
        }))
    }

    fn sort_argument(sort: &[SortClause]) -> Value {
        Value::Array(
            sort.iter()
                .map(|s| {
                    json!({
                        s.field.name(): { "order": s.direction.as_str() }
                    })
                })
                .collect(),
        )
    }

    fn highlight_argument(highlight: &HighlightRequest) -> Value {
        let fields: Map<String, Value> = highlight
            .fields
            .iter()
            .map(|f| (f.clone(), json!({})))
            .collect();

        let mut argument = json!({ "fields": fields });
        if let Some(pre_tag) = &highlight.pre_tag {
            argument["pre_tags"] = json!([pre_tag]);
        }
        if let Some(post_tag) = &highlight.post_tag {
            argument["post_tags"] = json!([post_tag]);
        }
        argument
    }

    /// `name` for a boost of exactly 1, `name^boost` otherwise.
    fn boosted_field(field: &str, boost: f64) -> String {
        if boost == 1.0 {
            field.to_string()
        } else {
            format!("{}^{}", field, boost)
        }
    }

    fn percent(value: u8) -> String {
        format!("{}%", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_search_shared::{MatchOperator, SortDirection};

    #[test]
    fn test_match_all_by_page_with_source_filter() {
        let spec = QuerySpec::builder()
            .page(0, 1)
            .include(["name", "studymodel"])
            .build()
            .unwrap();

        let compiled = QueryCompiler::compile_search(&spec);
        assert_eq!(
            compiled.body(),
            &json!({
                "from": 0,
                "size": 1,
                "query": { "match_all": {} },
                "_source": { "includes": ["name", "studymodel"], "excludes": [] }
            })
        );
    }

    #[test]
    fn test_term_query() {
        let compiled = QueryCompiler::compile_query(&Clause::term("name", "kimchy"));
        assert_eq!(
            compiled.query(),
            &json!({ "term": { "name": { "value": "kimchy" } } })
        );
    }

    #[test]
    fn test_match_query_with_sort() {
        let spec = QuerySpec::builder()
            .clause(MatchClause::new("name", "spring开发").operator(MatchOperator::Or))
            .sort(SortClause::new("price", SortDirection::Asc))
            .sort(SortClause::score(SortDirection::Asc))
            .build()
            .unwrap();

        let body = QueryCompiler::compile_search(&spec).into_body();
        assert_eq!(
            body["query"],
            json!({ "match": { "name": { "query": "spring开发", "operator": "or" } } })
        );
        assert_eq!(
            body["sort"],
            json!([{ "price": { "order": "asc" } }, { "_score": { "order": "asc" } }])
        );
        assert!(body.get("_source").is_none());
    }

    #[test]
    fn test_match_minimum_should_match() {
        let compiled = QueryCompiler::compile_query(&Clause::from(
            MatchClause::new("name", "spring开发")
                .operator(MatchOperator::And)
                .minimum_should_match(50),
        ));
        assert_eq!(
            compiled.query()["match"]["name"],
            json!({ "query": "spring开发", "operator": "and", "minimum_should_match": "50%" })
        );
    }

    #[test]
    fn test_multi_match_boost_suffix() {
        let clause = MultiMatchClause::new("spring开发", ["name", "description"])
            .minimum_should_match(50)
            .field("description", 10.0);

        let compiled = QueryCompiler::compile_query(&Clause::from(clause));
        assert_eq!(
            compiled.query(),
            &json!({
                "multi_match": {
                    "query": "spring开发",
                    "minimum_should_match": "50%",
                    "fields": ["name", "description^10"]
                }
            })
        );
    }

    #[test]
    fn test_fractional_boost_suffix() {
        let clause = MultiMatchClause::new("x", ["name"]).field("name", 0.5);
        let compiled = QueryCompiler::compile_query(&Clause::from(clause));
        assert_eq!(compiled.query()["multi_match"]["fields"], json!(["name^0.5"]));
    }

    #[test]
    fn test_range_bounds() {
        let inclusive = QueryCompiler::compile_query(&Clause::from(
            RangeClause::new("price").gte(5).lte(6),
        ));
        assert_eq!(
            inclusive.query(),
            &json!({ "range": { "price": { "gte": 5, "lte": 6 } } })
        );

        let exclusive =
            QueryCompiler::compile_query(&Clause::from(RangeClause::new("price").gt(5.5)));
        assert_eq!(
            exclusive.query(),
            &json!({ "range": { "price": { "gt": 5.5 } } })
        );
    }

    #[test]
    fn test_bool_keeps_filter_and_must_apart() {
        let clause = Clause::from(
            BoolClause::new()
                .must(Clause::match_all())
                .filter(Clause::term("studymodel", "201001"))
                .filter(RangeClause::new("price").gte(5).lte(6))
                .must_not(Clause::term("status", "archived")),
        );

        let compiled = QueryCompiler::compile_query(&clause);
        assert_eq!(
            compiled.query(),
            &json!({
                "bool": {
                    "must": [{ "match_all": {} }],
                    "filter": [
                        { "term": { "studymodel": { "value": "201001" } } },
                        { "range": { "price": { "gte": 5, "lte": 6 } } }
                    ],
                    "must_not": [{ "term": { "status": { "value": "archived" } } }]
                }
            })
        );
    }

    #[test]
    fn test_swapping_must_and_filter_changes_output() {
        let as_must = Clause::from(BoolClause::new().must(Clause::term("a", 1)));
        let as_filter = Clause::from(BoolClause::new().filter(Clause::term("a", 1)));
        assert_ne!(
            QueryCompiler::compile_query(&as_must),
            QueryCompiler::compile_query(&as_filter)
        );
    }

    #[test]
    fn test_empty_bool_compiles_to_match_all() {
        let empty = QueryCompiler::compile_query(&Clause::from(BoolClause::new()));
        let match_all = QueryCompiler::compile_query(&Clause::match_all());
        assert_eq!(empty, match_all);

        let nested = Clause::from(BoolClause::new().must(BoolClause::new()));
        assert_eq!(
            QueryCompiler::compile_query(&nested).query(),
            &json!({ "bool": { "must": [{ "match_all": {} }] } })
        );
    }

    #[test]
    fn test_highlight_argument() {
        let spec = QuerySpec::builder()
            .highlight(HighlightRequest::new(["description"]).tags("<tag>", "</tag>"))
            .build()
            .unwrap();

        let body = QueryCompiler::compile_search(&spec).into_body();
        assert_eq!(
            body["highlight"],
            json!({
                "pre_tags": ["<tag>"],
                "post_tags": ["</tag>"],
                "fields": { "description": {} }
            })
        );

        let spec = QuerySpec::builder()
            .highlight(HighlightRequest::new(["description"]))
            .build()
            .unwrap();
        let body = QueryCompiler::compile_search(&spec).into_body();
        assert!(body["highlight"].get("pre_tags").is_none());
    }

    #[test]
    fn test_track_total_hits() {
        let spec = QuerySpec::builder().track_total_hits(true).build().unwrap();
        let body = QueryCompiler::compile_search(&spec).into_body();
        assert_eq!(body["track_total_hits"], json!(true));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let build = || {
            QuerySpec::builder()
                .page(10, 5)
                .include(["price", "name"])
                .exclude(["pic"])
                .clause(
                    BoolClause::new()
                        .must(MultiMatchClause::new("spring开发", ["name", "description"]))
                        .filter(RangeClause::new("price").gte(5))
                        .should(Clause::term("tag", "java")),
                )
                .build()
                .unwrap()
        };

        let first = QueryCompiler::compile_search(&build());
        let second = QueryCompiler::compile_search(&build());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(first.body()).unwrap(),
            serde_json::to_string(second.body()).unwrap()
        );
    }
}
