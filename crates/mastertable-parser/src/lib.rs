pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::{ParserAttempt, ParserError};
pub use model::{normalize_column_name, SourceKind, SourceTable};
pub use registry::{load_source_file, parse_source_table, parse_with_parsers, SourceParser};
