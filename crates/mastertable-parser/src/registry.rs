use std::fs;
use std::path::Path;

use blake3::Hasher;
use polars::prelude::DataFrame;

use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{COMMA, SEMICOLON, SINGLE_COLUMN, TAB};
use crate::model::{SourceKind, SourceTable};

pub trait SourceParser {
    fn name(&self) -> &'static str;
    fn parse(&self, kind: SourceKind, content: &str) -> Result<DataFrame, ParserError>;
}

pub fn parse_source_table(kind: SourceKind, content: &str) -> Result<SourceTable, ParserError> {
    let parsers: [&dyn SourceParser; 4] = [&COMMA, &SEMICOLON, &TAB, &SINGLE_COLUMN];
    parse_with_parsers(kind, content, &parsers)
}

pub fn parse_with_parsers(
    kind: SourceKind,
    content: &str,
    parsers: &[&dyn SourceParser],
) -> Result<SourceTable, ParserError> {
    let content = content.trim_start_matches('\u{feff}');
    let content_hash = compute_hash(content.as_bytes());
    let mut attempts = Vec::new();

    for parser in parsers {
        match parser.parse(kind, content) {
            Ok(df) => {
                return Ok(SourceTable {
                    kind,
                    content_hash,
                    df,
                })
            }
            Err(ParserError::FormatMismatch { reason, .. }) => {
                attempts.push(ParserAttempt::new(parser.name(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ParserError::NoMatchingParser { kind, attempts })
}

/// Reads and parses one source file. Any failure here is fatal for a run.
pub fn load_source_file(kind: SourceKind, path: impl AsRef<Path>) -> Result<SourceTable, ParserError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ParserError::Io {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8(bytes).map_err(|_| ParserError::NotUtf8 {
        kind,
        path: path.to_path_buf(),
    })?;
    parse_source_table(kind, &content)
}

fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    let hash = hasher.finalize();
    hash.to_hex().to_string()
}
