use std::collections::HashSet;

use polars::prelude::*;

use crate::errors::ParserError;

/// Header positions kept for the frame; blank header cells (index columns
/// left behind by spreadsheet exports) are skipped.
#[derive(Debug, Clone)]
pub struct HeaderColumns {
    pub names: Vec<String>,
    pub positions: Vec<usize>,
}

pub(crate) fn parse_header(
    parser: &'static str,
    header: &csv::StringRecord,
    min_fields: usize,
) -> Result<HeaderColumns, ParserError> {
    if header.len() < min_fields {
        return Err(ParserError::FormatMismatch {
            parser,
            reason: format!(
                "expected at least {min_fields} header fields, found {}",
                header.len()
            ),
        });
    }

    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(header.len());
    let mut positions = Vec::with_capacity(header.len());

    for (position, raw) in header.iter().enumerate() {
        let name = raw.trim().trim_start_matches('\u{feff}').trim();
        if name.is_empty() || name.starts_with("Unnamed") {
            continue;
        }
        if !seen.insert(name.to_string()) {
            return Err(ParserError::InvalidHeader {
                parser,
                message: format!("duplicate column '{name}'"),
            });
        }
        names.push(name.to_string());
        positions.push(position);
    }

    if names.is_empty() {
        return Err(ParserError::InvalidHeader {
            parser,
            message: "header row has no named columns".to_string(),
        });
    }

    Ok(HeaderColumns { names, positions })
}

pub(crate) fn clean_cell(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

pub(crate) fn build_text_frame(
    parser: &'static str,
    header: &HeaderColumns,
    columns: Vec<Vec<Option<String>>>,
) -> Result<DataFrame, ParserError> {
    let mut cols: Vec<Column> = Vec::with_capacity(header.names.len());
    for (name, values) in header.names.iter().zip(columns) {
        let utf8: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
        cols.push(Series::new(name.as_str().into(), utf8).into());
    }

    DataFrame::new(cols).map_err(|err| ParserError::Validation {
        parser,
        message: format!("failed to build source dataframe: {err}"),
    })
}
