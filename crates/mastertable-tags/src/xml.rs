use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::errors::Result;
use crate::model::{Definition, TagDefinition, UnitDefinition};

pub const DEFINITION_NAMESPACE: &str = "SYSTEM_NAMESPACE";

/// Renders the definition tree with four-space indentation and no XML
/// declaration. Empty containers are written as self-closing elements.
pub fn to_xml(definition: &Definition) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

    let root = BytesStart::new("Definition").with_attributes([("xmlns", DEFINITION_NAMESPACE)]);
    if definition.areas.is_empty() {
        writer.write_event(Event::Empty(root))?;
        return Ok(String::from_utf8(writer.into_inner())?);
    }

    writer.write_event(Event::Start(root))?;
    for area in &definition.areas {
        writer.write_event(Event::Start(
            BytesStart::new("Area").with_attributes([("name", area.name.as_str())]),
        ))?;
        open(&mut writer, "UnitDefinitions", area.units.is_empty())?;
        for unit in &area.units {
            write_unit(&mut writer, unit)?;
        }
        close(&mut writer, "UnitDefinitions", area.units.is_empty())?;
        writer.write_event(Event::End(BytesEnd::new("Area")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Definition")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_unit(writer: &mut Writer<Vec<u8>>, unit: &UnitDefinition) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("UnitDefinition").with_attributes([
        ("name", unit.name.as_str()),
        ("description", unit.description.as_str()),
        ("type", ""),
    ])))?;
    open(writer, "TagDefinitions", unit.tags.is_empty())?;
    for tag in &unit.tags {
        write_tag(writer, tag)?;
    }
    close(writer, "TagDefinitions", unit.tags.is_empty())?;
    writer.write_event(Event::End(BytesEnd::new("UnitDefinition")))?;
    Ok(())
}

fn write_tag(writer: &mut Writer<Vec<u8>>, tag: &TagDefinition) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("TagDefinition").with_attributes([
        ("name", tag.name.as_str()),
        ("map", tag.map.as_str()),
        ("dataSourceName", tag.data_source_name.as_str()),
    ])))?;
    open(writer, "AliasDefinitions", tag.aliases.is_empty())?;
    for alias in &tag.aliases {
        writer.write_event(Event::Empty(
            BytesStart::new("AliasDefinition").with_attributes([("name", alias.as_str())]),
        ))?;
    }
    close(writer, "AliasDefinitions", tag.aliases.is_empty())?;
    writer.write_event(Event::End(BytesEnd::new("TagDefinition")))?;
    Ok(())
}

fn open(writer: &mut Writer<Vec<u8>>, name: &str, empty: bool) -> Result<()> {
    let element = BytesStart::new(name);
    if empty {
        writer.write_event(Event::Empty(element))?;
    } else {
        writer.write_event(Event::Start(element))?;
    }
    Ok(())
}

fn close(writer: &mut Writer<Vec<u8>>, name: &str, empty: bool) -> Result<()> {
    if !empty {
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{build_definition, TagRow};

    fn row(tag: &str, map: &str, alias: Option<&str>) -> TagRow {
        TagRow {
            area: "Plant".into(),
            unit: "Reactor1".into(),
            unit_description: "Main & only".into(),
            tag: tag.into(),
            tag_map: map.into(),
            alias_raw: alias.map(str::to_string),
        }
    }

    #[test]
    fn renders_nested_definition() {
        let definition = build_definition(
            &[row("TI100", "/R1/TI100", Some("temp, t1")), row("PI200", "/R1/PI200", None)],
            "HIST",
        );
        let xml = to_xml(&definition).unwrap();

        let expected = r#"<Definition xmlns="SYSTEM_NAMESPACE">
    <Area name="Plant">
        <UnitDefinitions>
            <UnitDefinition name="Reactor1" description="Main &amp; only" type="">
                <TagDefinitions>
                    <TagDefinition name="TI100" map="/R1/TI100" dataSourceName="HIST">
                        <AliasDefinitions>
                            <AliasDefinition name="temp"/>
                            <AliasDefinition name="t1"/>
                        </AliasDefinitions>
                    </TagDefinition>
                    <TagDefinition name="PI200" map="/R1/PI200" dataSourceName="HIST">
                        <AliasDefinitions/>
                    </TagDefinition>
                </TagDefinitions>
            </UnitDefinition>
        </UnitDefinitions>
    </Area>
</Definition>"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn empty_definition_is_a_single_element() {
        let xml = to_xml(&Definition::default()).unwrap();
        assert_eq!(xml, r#"<Definition xmlns="SYSTEM_NAMESPACE"/>"#);
    }
}
