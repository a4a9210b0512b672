//! Error types for clipcard-core.

use thiserror::Error;

use crate::types::ContentKind;

/// Result type alias using ParseError.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Validation failures while extracting fields from a clip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing question")]
    MissingQuestion,

    #[error("missing answer")]
    MissingAnswer,

    #[error("need at least two options, found {found}")]
    TooFewOptions { found: usize },

    #[error("answer {answer:?} does not name a populated option (have {available})")]
    InvalidAnswer { answer: String, available: String },

    #[error("missing {field} field")]
    MissingField { field: &'static str },

    #[error("empty clip")]
    Empty,
}

/// Failures while mapping parsed fields onto a card template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("template for {expected} cannot build {actual} content")]
    KindMismatch {
        expected: ContentKind,
        actual: ContentKind,
    },

    #[error("required field {target} has no value (source {source_field})")]
    MissingRequired {
        target: String,
        source_field: String,
    },

    #[error("no template configured for {0}")]
    NoTemplate(ContentKind),
}
