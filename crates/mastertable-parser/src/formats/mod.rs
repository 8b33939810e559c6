mod common;
mod delimited;

pub use delimited::{DelimitedParser, COMMA, SEMICOLON, SINGLE_COLUMN, TAB};

pub(crate) use common::{build_text_frame, clean_cell, parse_header};
