pub mod errors;
pub mod model;
pub mod reader;
pub mod validate;
pub mod xml;
mod convert;

pub use convert::{convert_file, discover_csv_files, output_path, resolve_inputs, ConversionOutcome};
pub use errors::{Result, TagError};
pub use model::{build_definition, AreaDefinition, Definition, TagDefinition, TagRow, UnitDefinition};
pub use reader::{parse_tag_rows, read_tag_rows};
pub use validate::{validate_aliases, DuplicateAlias};
pub use xml::to_xml;
