//! Text tokenization for the in-memory backend.
//!
//! Words of letters and digits become one lower-cased token each; every Han
//! ideograph is a token of its own, so "spring开发" yields `spring`, `开`, `发`.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Han}|[[\p{L}\p{N}]&&[^\p{Han}]]+").expect("token pattern is valid")
});

/// A token and its byte span in the original text.
pub(crate) struct TokenSpan {
    pub start: usize,
    pub end: usize,
    pub token: String,
}

/// Split text into lower-cased tokens, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    token_spans(text).map(|span| span.token).collect()
}

/// Tokens together with their position in `text`, used for highlighting.
pub(crate) fn token_spans(text: &str) -> impl Iterator<Item = TokenSpan> + '_ {
    TOKEN_PATTERN.find_iter(text).map(|m| TokenSpan {
        start: m.start(),
        end: m.end(),
        token: m.as_str().to_lowercase(),
    })
}
