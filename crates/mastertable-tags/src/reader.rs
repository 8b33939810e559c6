use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::errors::{Result, TagError};
use crate::model::TagRow;

pub const AREA_COLUMN: &str = "Area name";
pub const UNIT_COLUMN: &str = "Unit name";
pub const UNIT_DESCRIPTION_COLUMN: &str = "Unit description";
pub const TAG_COLUMN: &str = "Tag name";
pub const TAG_MAP_COLUMN: &str = "Tag map";
pub const ALIAS_COLUMN: &str = "Alias name";

struct TagColumns {
    area: usize,
    unit: usize,
    unit_description: usize,
    tag: usize,
    tag_map: usize,
    alias: usize,
}

impl TagColumns {
    fn from_header(header: &StringRecord) -> Result<Self> {
        let find = |column: &'static str| {
            header
                .iter()
                .position(|name| name.trim_start_matches('\u{feff}') == column)
                .ok_or(TagError::MissingColumn { column })
        };

        Ok(Self {
            area: find(AREA_COLUMN)?,
            unit: find(UNIT_COLUMN)?,
            unit_description: find(UNIT_DESCRIPTION_COLUMN)?,
            tag: find(TAG_COLUMN)?,
            tag_map: find(TAG_MAP_COLUMN)?,
            alias: find(ALIAS_COLUMN)?,
        })
    }
}

/// Parses a tag export. Extra columns are ignored and fully blank lines are
/// dropped.
pub fn parse_tag_rows(content: &str) -> Result<Vec<TagRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let columns = TagColumns::from_header(reader.headers()?)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let text = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        rows.push(TagRow {
            area: text(columns.area),
            unit: text(columns.unit),
            unit_description: text(columns.unit_description),
            tag: text(columns.tag),
            tag_map: text(columns.tag_map),
            alias_raw: record
                .get(columns.alias)
                .filter(|alias| !alias.is_empty())
                .map(str::to_string),
        });
    }

    Ok(rows)
}

pub fn read_tag_rows(path: &Path) -> Result<Vec<TagRow>> {
    let content = fs::read_to_string(path).map_err(|source| TagError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tag_rows(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Area name,Unit name,Unit description,Tag name,Tag map,Alias name";

    #[test]
    fn reads_rows_and_drops_blank_lines() {
        let csv = format!(
            "{HEADER}\n\
             Plant,Reactor1,Main reactor,TI100,/R1/TI100,\"temp, t1\"\n\
             ,,,,,\n\
             Plant,Reactor1,Main reactor,PI200,/R1/PI200,\n"
        );
        let rows = parse_tag_rows(&csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag, "TI100");
        assert_eq!(rows[0].alias_raw.as_deref(), Some("temp, t1"));
        assert_eq!(rows[1].alias_raw, None);
    }

    #[test]
    fn columns_are_found_by_name_in_any_order() {
        let csv = "Unnamed: 0,Alias name,Tag name,Tag map,Area name,Unit name,Unit description\n\
                   0,a1,T1,m1,A,U,desc\n";
        let rows = parse_tag_rows(csv).unwrap();

        assert_eq!(rows[0].area, "A");
        assert_eq!(rows[0].unit_description, "desc");
        assert_eq!(rows[0].alias_raw.as_deref(), Some("a1"));
    }

    #[test]
    fn short_rows_are_padded_with_blanks() {
        let csv = format!("{HEADER}\nPlant,R1,desc,T1\n");
        let rows = parse_tag_rows(&csv).unwrap();
        assert_eq!(rows[0].tag_map, "");
        assert_eq!(rows[0].alias_raw, None);
    }

    #[test]
    fn missing_column_is_reported() {
        let err = parse_tag_rows("Area name,Unit name\nA,U\n").unwrap_err();
        assert!(matches!(
            err,
            TagError::MissingColumn {
                column: "Unit description"
            }
        ));
    }
}
