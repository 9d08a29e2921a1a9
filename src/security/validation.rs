//! Poll input validation.
//!
//! Rules run in a fixed order and the first failure wins:
//! question non-empty → question length → question forbidden patterns →
//! option count → per option (non-empty, length, forbidden patterns) →
//! option uniqueness (case-insensitive, trimmed).
//!
//! Validation looks at the raw input so limits reflect what the user typed,
//! not the escaped form produced by [`super::sanitize`]. The sanitized form is
//! checked again by [`validate_cleaned`] before it is stored.

use regex::RegexSet;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_OPTION_CHARS: usize = 200;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

/// Case-insensitive blocklist of markup and URI-scheme patterns.
static FORBIDDEN: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)<\s*/?\s*script",
        r"(?i)<\s*/?\s*(iframe|object|embed|svg|style|link|meta)\b",
        r"(?i)javascript\s*:",
        r"(?i)vbscript\s*:",
        r"(?i)data\s*:\s*text/html",
        r"(?i)\bon(load|error|click|dblclick|focus|blur|change|submit|input|key\w+|mouse\w+)\s*=",
        r"(?i)expression\s*\(",
    ])
    .expect("forbidden pattern set is valid")
});

/// A user-correctable problem with submitted poll content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("question is required")]
    EmptyQuestion,

    #[error("question must be at most {max} characters")]
    QuestionTooLong { max: usize },

    #[error("{field} contains forbidden content")]
    ForbiddenContent { field: String },

    #[error("a poll needs at least {min} options")]
    TooFewOptions { min: usize },

    #[error("a poll can have at most {max} options")]
    TooManyOptions { max: usize },

    #[error("option {position} is empty")]
    EmptyOption { position: usize },

    #[error("option {position} must be at most {max} characters")]
    OptionTooLong { position: usize, max: usize },

    #[error("option {position} duplicates an earlier option")]
    DuplicateOption { position: usize },
}

/// True when the text matches any blocklisted pattern.
pub fn contains_forbidden(text: &str) -> bool {
    FORBIDDEN.is_match(text)
}

/// Validate a poll question and its options.
pub fn validate_poll(question: &str, options: &[String]) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ValidationError::QuestionTooLong { max: MAX_QUESTION_CHARS });
    }
    if contains_forbidden(question) {
        return Err(ValidationError::ForbiddenContent { field: "question".into() });
    }

    if options.len() < MIN_OPTIONS {
        return Err(ValidationError::TooFewOptions { min: MIN_OPTIONS });
    }
    if options.len() > MAX_OPTIONS {
        return Err(ValidationError::TooManyOptions { max: MAX_OPTIONS });
    }

    // Positions are 1-based in messages shown to users.
    for (i, option) in options.iter().enumerate() {
        let position = i + 1;
        if option.trim().is_empty() {
            return Err(ValidationError::EmptyOption { position });
        }
        if option.chars().count() > MAX_OPTION_CHARS {
            return Err(ValidationError::OptionTooLong { position, max: MAX_OPTION_CHARS });
        }
        if contains_forbidden(option) {
            return Err(ValidationError::ForbiddenContent { field: format!("option {}", position) });
        }
    }

    check_unique(options)
}

/// Re-check content after [`sanitize`](super::sanitize) ran. Stripping markup
/// can empty a field or make two options equal.
pub fn validate_cleaned(question: &str, options: &[String]) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    for (i, option) in options.iter().enumerate() {
        if option.trim().is_empty() {
            return Err(ValidationError::EmptyOption { position: i + 1 });
        }
    }
    check_unique(options)
}

/// Options compare case-insensitively, ignoring surrounding whitespace.
fn check_unique(options: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(options.len());
    for (i, option) in options.iter().enumerate() {
        if !seen.insert(option.trim().to_lowercase()) {
            return Err(ValidationError::DuplicateOption { position: i + 1 });
        }
    }
    Ok(())
}
