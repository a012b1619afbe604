//! Placeholder Expansion
//!
//! `{KEY}` is replaced by the value bound to `KEY`; `{{` and `}}` stand for
//! literal braces. Anything else between braces is a key lookup, so a typo
//! surfaces as an undefined placeholder instead of passing through.

use std::collections::BTreeMap;
use thiserror::Error;

/// Malformed pattern or unknown key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
    #[error("Undefined placeholder: '{0}'")]
    Undefined(String),

    #[error("Single '{{' encountered in format string")]
    SingleOpen,

    #[error("Single '}}' encountered in format string")]
    SingleClose,

    #[error("expected '}}' before end of string")]
    Unterminated,

    #[error("unexpected '{{' in field name")]
    NestedOpen,
}

/// Expand every placeholder in `pattern` using `bindings`.
pub fn expand(pattern: &str, bindings: &BTreeMap<String, String>) -> Result<String, PlaceholderError> {
    let mut out = String::with_capacity(pattern.len());
    for token in tokenize(pattern) {
        match token? {
            Token::Text(text) => out.push_str(text),
            Token::Brace(c) => out.push(c),
            Token::Placeholder(key) => match bindings.get(key) {
                Some(value) => out.push_str(value),
                None => return Err(PlaceholderError::Undefined(key.to_string())),
            },
        }
    }
    Ok(out)
}

/// Check that `pattern` is well-formed and refers only to `keys`.
pub fn validate<'k>(
    pattern: &str,
    keys: impl IntoIterator<Item = &'k str> + Clone,
) -> Result<(), PlaceholderError> {
    for token in tokenize(pattern) {
        if let Token::Placeholder(key) = token? {
            if !keys.clone().into_iter().any(|k| k == key) {
                return Err(PlaceholderError::Undefined(key.to_string()));
            }
        }
    }
    Ok(())
}

/// Whether `pattern` mentions `{key}` as a placeholder (escaped braces don't count).
pub fn mentions(pattern: &str, key: &str) -> bool {
    tokenize(pattern).any(|t| matches!(t, Ok(Token::Placeholder(k)) if k == key))
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Brace(char),
    Placeholder(&'a str),
}

fn tokenize(pattern: &str) -> Tokens<'_> {
    Tokens {
        rest: pattern,
        failed: false,
    }
}

struct Tokens<'a> {
    rest: &'a str,
    failed: bool,
}

impl<'a> Tokens<'a> {
    fn fail(&mut self, e: PlaceholderError) -> Option<Result<Token<'a>, PlaceholderError>> {
        self.failed = true;
        Some(Err(e))
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Token<'a>, PlaceholderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        let rest = self.rest;

        let Some(pos) = rest.find(['{', '}']) else {
            self.rest = "";
            return Some(Ok(Token::Text(rest)));
        };
        if pos > 0 {
            self.rest = &rest[pos..];
            return Some(Ok(Token::Text(&rest[..pos])));
        }

        let brace = if rest.starts_with('{') { '{' } else { '}' };
        if rest[1..].starts_with(brace) {
            self.rest = &rest[2..];
            return Some(Ok(Token::Brace(brace)));
        }
        if brace == '}' {
            return self.fail(PlaceholderError::SingleClose);
        }
        if rest.len() == 1 {
            return self.fail(PlaceholderError::SingleOpen);
        }

        let body = &rest[1..];
        match body.find(['{', '}']) {
            Some(end) if body[end..].starts_with('}') => {
                self.rest = &body[end + 1..];
                Some(Ok(Token::Placeholder(&body[..end])))
            }
            Some(_) => self.fail(PlaceholderError::NestedOpen),
            None => self.fail(PlaceholderError::Unterminated),
        }
    }
}
