//! Command line parsing and execution.
//!
//! Each command maps onto one `DocumentStore` operation. Arguments that carry
//! documents, clauses or query specs are JSON; results are returned as JSON.

use clap::{Parser, Subcommand};
use document_search_repository::{DocumentStore, SearchIndexError};
use document_search_shared::{Clause, Document, QuerySpec, SearchResult};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::info;

use crate::config::RunnerSettings;
use crate::AppError;

/// Write, read and search documents in OpenSearch or in memory.
#[derive(Debug, Parser)]
#[command(
    name = "document-search",
    version,
    subcommand_required = true,
    arg_required_else_help = true,
    after_help = "Cluster settings: ES_URL, ES_NAME, ES_PASSWORD, ES_CONNECT_TIMEOUT_SECS, \
                  ES_REQUEST_TIMEOUT_SECS. Logging: RUST_LOG, LOG_FORMAT=json."
)]
pub struct Cli {
    #[command(flatten)]
    pub settings: RunnerSettings,

    #[command(subcommand)]
    pub command: Command,
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Store a document, replacing any previous version
    Create {
        index: String,
        id: String,
        #[arg(value_parser = parse_document)]
        document: Document,
    },
    /// Fetch a document by id
    Get { index: String, id: String },
    /// Check whether a document exists
    Exists { index: String, id: String },
    /// Merge a partial document into a stored one
    Update {
        index: String,
        id: String,
        #[arg(value_parser = parse_document)]
        partial: Document,
    },
    /// Delete a document by id
    Delete { index: String, id: String },
    /// Delete every document matching a clause
    DeleteByQuery {
        #[arg(value_parser = parse_clause)]
        clause: Clause,
        #[arg(required = true)]
        indexes: Vec<String>,
    },
    /// Run a search and print the result
    Search {
        #[arg(value_parser = parse_query_spec)]
        spec: QuerySpec,
        #[arg(required = true)]
        indexes: Vec<String>,
    },
    /// Run a search in the background and wait for its callback
    SearchAsync {
        #[arg(value_parser = parse_query_spec)]
        spec: QuerySpec,
        #[arg(required = true)]
        indexes: Vec<String>,
    },
}

impl Command {
    /// Run the command against the store and return its JSON result.
    pub async fn execute(self, store: &DocumentStore) -> Result<Value, AppError> {
        match self {
            Self::Create { index, id, document } => {
                let result = store.create(&index, &id, &document).await?;
                Ok(serde_json::to_value(result)?)
            }
            Self::Get { index, id } => {
                let document = store.get(&index, &id).await?;
                Ok(match document {
                    Some(stored) => json!({
                        "found": true,
                        "id": stored.id,
                        "index_name": stored.index_name,
                        "version": stored.version,
                        "source": stored.source,
                    }),
                    None => json!({ "found": false, "id": id, "index_name": index }),
                })
            }
            Self::Exists { index, id } => {
                let exists = store.exists(&index, &id).await?;
                Ok(json!({ "exists": exists }))
            }
            Self::Update { index, id, partial } => {
                let outcome = store.update(&index, &id, &partial).await?;
                Ok(serde_json::to_value(outcome)?)
            }
            Self::Delete { index, id } => {
                let outcome = store.delete(&index, &id).await?;
                Ok(serde_json::to_value(outcome)?)
            }
            Self::DeleteByQuery { clause, indexes } => {
                let deleted = store.delete_by_query(&clause, &indexes).await?;
                Ok(json!({ "deleted": deleted }))
            }
            Self::Search { spec, indexes } => {
                let result = store.search(&spec, &indexes).await?;
                Ok(serde_json::to_value(result)?)
            }
            Self::SearchAsync { spec, indexes } => {
                let result = search_and_wait(store, spec, indexes).await?;
                Ok(serde_json::to_value(result)?)
            }
        }
    }
}

/// Start an async search and wait for whichever callback fires.
async fn search_and_wait(
    store: &DocumentStore,
    spec: QuerySpec,
    indexes: Vec<String>,
) -> Result<SearchResult, AppError> {
    let (tx, rx) = oneshot::channel::<Result<SearchResult, SearchIndexError>>();
    let error_tx = std::sync::Arc::new(std::sync::Mutex::new(Some(tx)));
    let complete_tx = error_tx.clone();

    let handle = store.search_async(
        spec,
        indexes,
        move |result| {
            if let Some(tx) = complete_tx.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(Ok(result));
            }
        },
        move |e| {
            if let Some(tx) = error_tx.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(Err(e));
            }
        },
    );

    info!("Async search submitted");
    if !handle.join().await {
        return Err(AppError::usage("search was cancelled"));
    }

    let outcome = rx
        .await
        .map_err(|_| AppError::usage("search finished without a result"))?;
    Ok(outcome?)
}

fn parse_document(raw: &str) -> Result<Document, AppError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(document) => Ok(document),
        _ => Err(AppError::usage("document must be a JSON object")),
    }
}

fn parse_clause(raw: &str) -> Result<Clause, AppError> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_query_spec(raw: &str) -> Result<QuerySpec, AppError> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(raw: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("document-search").chain(raw.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_parse_create() {
        let command = parse(&["create", "docs", "1", r#"{"name":"kimchy","price":3.14}"#]).unwrap();
        match command {
            Command::Create { index, id, document } => {
                assert_eq!(index, "docs");
                assert_eq!(id, "1");
                assert_eq!(document["name"], json!("kimchy"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_search_with_several_indexes() {
        let command = parse(&[
            "search",
            r#"{"limit":5,"clause":{"type":"term","field":"name","value":"kimchy"}}"#,
            "docs",
            "archive",
        ])
        .unwrap();
        match command {
            Command::Search { spec, indexes } => {
                assert_eq!(spec.limit, 5);
                assert_eq!(spec.clause, Clause::term("name", "kimchy"));
                assert_eq!(indexes, vec!["docs", "archive"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_kebab_case_subcommands() {
        let command = parse(&[
            "delete-by-query",
            r#"{"type":"term","field":"status","value":"draft"}"#,
            "docs",
        ])
        .unwrap();
        assert_eq!(
            command,
            Command::DeleteByQuery {
                clause: Clause::term("status", "draft"),
                indexes: vec!["docs".to_string()],
            }
        );
        assert!(matches!(
            parse(&["search-async", "{}", "docs"]).unwrap(),
            Command::SearchAsync { .. }
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert_eq!(
            parse(&["get", "docs"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["frobnicate"]).unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
        assert_eq!(
            parse(&["search", "{}"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["create", "docs", "1", "[1, 2]"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            parse(&["delete-by-query", "not json", "docs"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
