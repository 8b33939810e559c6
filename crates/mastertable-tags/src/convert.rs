use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::{Result, TagError};
use crate::model::build_definition;
use crate::reader::read_tag_rows;
use crate::validate::{validate_aliases, DuplicateAlias};
use crate::xml::to_xml;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Written { path: PathBuf, tags: usize },
    Skipped { duplicates: Vec<DuplicateAlias> },
}

/// `<dir>/<stem>_<data source>.xml` next to the CSV.
pub fn output_path(csv_path: &Path, data_source_name: &str) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    csv_path.with_file_name(format!("{stem}_{data_source_name}.xml"))
}

/// Validates and converts one tag CSV. A file with duplicate aliases is left
/// alone and reported as skipped.
pub fn convert_file(csv_path: &Path, data_source_name: &str) -> Result<ConversionOutcome> {
    let rows = read_tag_rows(csv_path)?;

    let duplicates = validate_aliases(&rows);
    if !duplicates.is_empty() {
        for duplicate in &duplicates {
            warn!(
                file = %csv_path.display(),
                area = %duplicate.area,
                unit = %duplicate.unit,
                alias = %duplicate.alias,
                occurrences = duplicate.occurrences,
                "Duplicate alias names detected"
            );
        }
        return Ok(ConversionOutcome::Skipped { duplicates });
    }

    let definition = build_definition(&rows, data_source_name);
    let xml = to_xml(&definition)?;
    let path = output_path(csv_path, data_source_name);
    fs::write(&path, xml).map_err(|source| TagError::Io {
        path: path.clone(),
        source,
    })?;

    let tags = definition.tag_count();
    info!(
        input = %csv_path.display(),
        output = %path.display(),
        tags,
        "XML file created"
    );
    Ok(ConversionOutcome::Written { path, tags })
}

/// Every `*.csv` directly inside `dir`, sorted.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.csv");
    let mut files = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy())? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Could not read path from glob pattern"),
        }
    }
    files.sort();
    Ok(files)
}

/// The explicit file if given (it must exist and end in `.csv`), otherwise
/// every CSV in `dir`.
pub fn resolve_inputs(csv_path: Option<&Path>, dir: &Path) -> Result<Vec<PathBuf>> {
    match csv_path {
        Some(path) => {
            let is_csv = path.extension().is_some_and(|ext| ext == "csv");
            if !is_csv || !path.is_file() {
                return Err(TagError::InvalidInput {
                    path: path.to_path_buf(),
                });
            }
            Ok(vec![path.to_path_buf()])
        }
        None => discover_csv_files(dir),
    }
}
