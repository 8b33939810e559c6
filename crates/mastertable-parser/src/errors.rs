use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::SourceKind;

#[derive(Debug, Clone)]
pub struct ParserAttempt {
    pub parser: &'static str,
    pub message: String,
}

impl ParserAttempt {
    pub fn new(parser: &'static str, message: impl Into<String>) -> Self {
        Self {
            parser,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParserAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.parser, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{parser} format mismatch: {reason}")]
    FormatMismatch {
        parser: &'static str,
        reason: String,
    },

    #[error("{parser} header invalid: {message}")]
    InvalidHeader {
        parser: &'static str,
        message: String,
    },

    #[error("{parser} CSV error: {source}")]
    Csv {
        parser: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{parser} validation error: {message}")]
    Validation {
        parser: &'static str,
        message: String,
    },

    #[error("{parser} input did not contain a header row")]
    EmptyData { parser: &'static str },

    #[error("{kind} source is missing required column '{column}'")]
    MissingColumn { kind: SourceKind, column: String },

    #[error("failed to read {kind} source {}: {source}", .path.display())]
    Io {
        kind: SourceKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} source {} is not valid UTF-8", .path.display())]
    NotUtf8 { kind: SourceKind, path: PathBuf },

    #[error("no parser recognized the {kind} source; attempts: {attempts:?}")]
    NoMatchingParser {
        kind: SourceKind,
        attempts: Vec<ParserAttempt>,
    },
}
