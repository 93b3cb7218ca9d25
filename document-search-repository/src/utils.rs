//! Utility functions for validating request arguments.

use crate::errors::SearchIndexError;

/// Characters an index name may not contain.
const INDEX_NAME_FORBIDDEN: &[char] = &[
    '\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':',
];

/// Validate an index name.
///
/// Index names must be non-empty, lower-case, must not start with `-`, `_` or `+`
/// and must not contain any of `\ / * ? " < > | , # :` or spaces.
///
/// # Example
///
/// ```
/// use document_search_repository::utils::validate_index_name;
///
/// assert!(validate_index_name("xc_course").is_ok());
/// assert!(validate_index_name("Courses").is_err());
/// ```
pub fn validate_index_name(name: &str) -> Result<(), SearchIndexError> {
    if name.is_empty() {
        return Err(SearchIndexError::validation("Index name cannot be empty"));
    }
    if name.starts_with(['-', '_', '+']) {
        return Err(SearchIndexError::validation(format!(
            "Index name '{}' must not start with '-', '_' or '+'",
            name
        )));
    }
    if name.chars().any(|c| c.is_uppercase()) {
        return Err(SearchIndexError::validation(format!(
            "Index name '{}' must be lower case",
            name
        )));
    }
    if let Some(c) = name.chars().find(|c| INDEX_NAME_FORBIDDEN.contains(c)) {
        return Err(SearchIndexError::validation(format!(
            "Index name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    Ok(())
}

/// Validate a non-empty list of index names.
pub fn validate_indexes(indexes: &[String]) -> Result<(), SearchIndexError> {
    if indexes.is_empty() {
        return Err(SearchIndexError::validation(
            "At least one index must be provided",
        ));
    }
    indexes.iter().try_for_each(|name| validate_index_name(name))
}

/// Validate a document id. Any non-blank string up to 512 bytes is accepted.
pub fn validate_document_id(id: &str) -> Result<(), SearchIndexError> {
    if id.trim().is_empty() {
        return Err(SearchIndexError::validation("Document id cannot be empty"));
    }
    if id.len() > 512 {
        return Err(SearchIndexError::validation(format!(
            "Document id is {} bytes long, the limit is 512",
            id.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_index_name_valid() {
        for name in ["xc_course", "docs", "logs-2024.01", "a1"] {
            assert!(validate_index_name(name).is_ok(), "expected '{}' to be valid", name);
        }
    }

    #[test]
    fn test_validate_index_name_invalid() {
        let test_cases = vec![
            ("", "empty"),
            ("Docs", "upper case"),
            ("_docs", "leading underscore"),
            ("-docs", "leading dash"),
            ("+docs", "leading plus"),
            ("my docs", "contains space"),
            ("a/b", "contains slash"),
            ("a*", "contains star"),
            ("a,b", "contains comma"),
            ("a:b", "contains colon"),
            ("a#b", "contains hash"),
        ];

        for (name, description) in test_cases {
            let result = validate_index_name(name);
            assert!(
                matches!(result, Err(SearchIndexError::ValidationError(_))),
                "Expected ValidationError for '{}' ({})",
                name,
                description
            );
        }
    }

    #[test]
    fn test_validate_indexes() {
        assert!(validate_indexes(&[]).is_err());
        assert!(validate_indexes(&["a".to_string(), "b".to_string()]).is_ok());
        assert!(validate_indexes(&["a".to_string(), "B".to_string()]).is_err());
    }

    #[test]
    fn test_validate_document_id() {
        assert!(validate_document_id("1").is_ok());
        assert!(validate_document_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("   ").is_err());
        assert!(validate_document_id(&"x".repeat(513)).is_err());
    }
}
