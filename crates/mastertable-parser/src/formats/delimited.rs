use csv::ReaderBuilder;
use polars::prelude::DataFrame;
use tracing::warn;

use crate::errors::ParserError;
use crate::formats::{build_text_frame, clean_cell, parse_header};
use crate::model::SourceKind;
use crate::registry::SourceParser;

pub const COMMA: DelimitedParser = DelimitedParser {
    name: "comma_delimited",
    delimiter: b',',
    min_fields: 2,
};
pub const SEMICOLON: DelimitedParser = DelimitedParser {
    name: "semicolon_delimited",
    delimiter: b';',
    min_fields: 2,
};
pub const TAB: DelimitedParser = DelimitedParser {
    name: "tab_delimited",
    delimiter: b'\t',
    min_fields: 2,
};
/// Last resort for sources that carry one column only, e.g. a bare batch list.
pub const SINGLE_COLUMN: DelimitedParser = DelimitedParser {
    name: "single_column",
    delimiter: b',',
    min_fields: 1,
};

/// Header-first delimited text. A header with fewer than `min_fields` fields
/// is reported as a format mismatch so the next delimiter can be tried.
///
/// Populated fields past the header width are dropped with a warning; the
/// row itself is kept.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedParser {
    name: &'static str,
    delimiter: u8,
    min_fields: usize,
}

impl SourceParser for DelimitedParser {
    fn name(&self) -> &'static str {
        self.name
    }

    fn parse(&self, kind: SourceKind, content: &str) -> Result<DataFrame, ParserError> {
        let parser = self.name;
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut records = reader.records();
        let header_record = match records.next() {
            Some(record) => record.map_err(|source| ParserError::Csv { parser, source })?,
            None => return Err(ParserError::EmptyData { parser }),
        };
        let header = parse_header(parser, &header_record, self.min_fields)?;

        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); header.names.len()];

        for record in records {
            let record = record.map_err(|source| ParserError::Csv { parser, source })?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            if record.len() > header_record.len() {
                let overflow = record
                    .iter()
                    .skip(header_record.len())
                    .any(|field| !field.trim().is_empty());
                if overflow {
                    let line = record.position().map(|pos| pos.line()).unwrap_or(0);
                    warn!(
                        source = %kind,
                        parser,
                        line,
                        expected = header_record.len(),
                        found = record.len(),
                        "Dropping fields past the header width"
                    );
                }
            }

            for (column, &position) in columns.iter_mut().zip(&header.positions) {
                column.push(clean_cell(record.get(position)));
            }
        }

        build_text_frame(parser, &header, columns)
    }
}
