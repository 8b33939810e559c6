use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tag CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("tag CSV is missing required column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("XML writer error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("invalid file path or format: {}", .path.display())]
    InvalidInput { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, TagError>;
