use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ParserError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ProcessParameters,
    BatchEvents,
    OperationalTelemetry,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ProcessParameters => "process_parameters",
            SourceKind::BatchEvents => "batch_events",
            SourceKind::OperationalTelemetry => "operational_telemetry",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One loaded source file: every column kept as nullable text, empty cells null.
///
/// Typing (timestamps, floats) is left to the consumer so that coercion
/// failures can degrade to missing values instead of aborting the load.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub kind: SourceKind,
    pub content_hash: String,
    pub df: DataFrame,
}

impl SourceTable {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str().to_string())
            .collect()
    }

    /// Resolves a configured column name against the header. Exact matches win,
    /// otherwise names are compared after [`normalize_column_name`].
    pub fn find_column(&self, wanted: &str) -> Option<String> {
        let names = self.column_names();
        if let Some(exact) = names.iter().find(|name| name.as_str() == wanted) {
            return Some(exact.clone());
        }
        let normalized = normalize_column_name(wanted);
        names
            .into_iter()
            .find(|name| normalize_column_name(name) == normalized)
    }

    pub fn require_column(&self, wanted: &str) -> Result<String, ParserError> {
        self.find_column(wanted)
            .ok_or_else(|| ParserError::MissingColumn {
                kind: self.kind,
                column: wanted.to_string(),
            })
    }

    pub fn text_column(&self, name: &str) -> PolarsResult<&StringChunked> {
        self.df.column(name)?.str()
    }
}

/// Lowercases and drops whitespace, `_` and `-` so `Parameter 1`, `parameter_1`
/// and `Parameter1` refer to the same column.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
