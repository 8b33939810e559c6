use std::collections::HashMap;

use crate::model::TagRow;

/// A raw alias cell that occurs more than once inside one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateAlias {
    pub area: String,
    pub unit: String,
    pub alias: String,
    pub occurrences: usize,
}

/// Finds repeated alias cells per (area, unit). Cells are compared whole,
/// before splitting; empty cells are ignored. An empty result means the file
/// may be converted.
pub fn validate_aliases(rows: &[TagRow]) -> Vec<DuplicateAlias> {
    let mut counts: HashMap<(&str, &str, &str), usize> = HashMap::new();
    let mut order = Vec::new();

    for row in rows {
        let Some(alias) = row.alias_raw.as_deref() else {
            continue;
        };
        let key = (row.area.as_str(), row.unit.as_str(), alias);
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(key);
        }
    }

    order
        .into_iter()
        .map(|key @ (area, unit, alias)| DuplicateAlias {
            area: area.to_string(),
            unit: unit.to_string(),
            alias: alias.to_string(),
            occurrences: counts.get(&key).copied().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(unit: &str, alias: Option<&str>) -> TagRow {
        TagRow {
            area: "A".into(),
            unit: unit.into(),
            tag: "T".into(),
            alias_raw: alias.map(str::to_string),
            ..TagRow::default()
        }
    }

    #[test]
    fn distinct_aliases_pass() {
        let rows = vec![row("U1", Some("a")), row("U1", Some("b")), row("U1", None), row("U1", None)];
        assert!(validate_aliases(&rows).is_empty());
    }

    #[test]
    fn same_alias_in_other_unit_is_fine() {
        let rows = vec![row("U1", Some("a")), row("U2", Some("a"))];
        assert!(validate_aliases(&rows).is_empty());
    }

    #[test]
    fn repeated_cell_within_unit_is_flagged_once() {
        let rows = vec![
            row("U1", Some("a, b")),
            row("U1", Some("a, b")),
            row("U1", Some("a, b")),
            row("U1", Some("a")),
        ];
        let duplicates = validate_aliases(&rows);
        assert_eq!(
            duplicates,
            vec![DuplicateAlias {
                area: "A".into(),
                unit: "U1".into(),
                alias: "a, b".into(),
                occurrences: 3,
            }]
        );
    }
}
