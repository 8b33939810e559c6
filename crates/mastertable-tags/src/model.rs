/// One line of a tag export. Cells are trimmed; blanks become empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagRow {
    pub area: String,
    pub unit: String,
    pub unit_description: String,
    pub tag: String,
    pub tag_map: String,
    /// The raw `Alias name` cell: comma separated, possibly absent.
    pub alias_raw: Option<String>,
}

impl TagRow {
    /// Aliases of the cell in order, blanks dropped.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.alias_raw
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Definition {
    pub areas: Vec<AreaDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaDefinition {
    pub name: String,
    pub units: Vec<UnitDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDefinition {
    pub name: String,
    pub description: String,
    pub tags: Vec<TagDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinition {
    pub name: String,
    pub map: String,
    pub data_source_name: String,
    pub aliases: Vec<String>,
}

impl Definition {
    pub fn tag_count(&self) -> usize {
        self.areas
            .iter()
            .flat_map(|area| area.units.iter())
            .map(|unit| unit.tags.len())
            .sum()
    }

    fn unit_mut(&mut self, area: &str, unit: &str) -> &mut UnitDefinition {
        let area_idx = match self.areas.iter().position(|a| a.name == area) {
            Some(idx) => idx,
            None => {
                self.areas.push(AreaDefinition {
                    name: area.to_string(),
                    units: Vec::new(),
                });
                self.areas.len() - 1
            }
        };
        let units = &mut self.areas[area_idx].units;

        let unit_idx = match units.iter().position(|u| u.name == unit) {
            Some(idx) => idx,
            None => {
                units.push(UnitDefinition {
                    name: unit.to_string(),
                    description: String::new(),
                    tags: Vec::new(),
                });
                units.len() - 1
            }
        };
        &mut units[unit_idx]
    }
}

/// Groups rows into Area → Unit → Tag, keeping first-seen order at every
/// level.
///
/// A unit takes the description of the last row naming it. The first row of
/// a tag fixes its map; later rows for the same tag only add aliases not
/// seen yet.
pub fn build_definition(rows: &[TagRow], data_source_name: &str) -> Definition {
    let mut definition = Definition::default();

    for row in rows {
        let unit = definition.unit_mut(&row.area, &row.unit);
        unit.description = row.unit_description.clone();

        match unit.tags.iter_mut().find(|tag| tag.name == row.tag) {
            Some(existing) => {
                for alias in row.aliases() {
                    if !existing.aliases.iter().any(|known| known == alias) {
                        existing.aliases.push(alias.to_string());
                    }
                }
            }
            None => unit.tags.push(TagDefinition {
                name: row.tag.clone(),
                map: row.tag_map.clone(),
                data_source_name: data_source_name.to_string(),
                aliases: row.aliases().map(str::to_string).collect(),
            }),
        }
    }

    definition
}
