use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use mastertable_parser::SourceKind;
use polars::prelude::{DataFrame, DataType};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub kind: SourceKind,
    pub content_hash: String,
    pub rows_loaded: usize,
    /// Rows that survived timestamp parsing (or carried a batch id).
    pub rows_usable: usize,
}

/// What one run consumed and produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<SourceSummary>,
    pub batch_count: usize,
    pub column_count: usize,
    pub column_types: BTreeMap<String, usize>,
    pub missing_cells: usize,
    pub warning_count: usize,
}

impl RunSummary {
    pub fn new(
        sources: Vec<SourceSummary>,
        df: &DataFrame,
        missing_cells: usize,
        warning_count: usize,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            sources,
            batch_count: df.height(),
            column_count: df.width(),
            column_types: column_types(df),
            missing_cells,
            warning_count,
        }
    }

    pub fn source(&self, kind: SourceKind) -> Option<&SourceSummary> {
        self.sources.iter().find(|source| source.kind == kind)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

/// Column count per dtype name, e.g. `{"f64": 26, "str": 10}`.
pub fn column_types(df: &DataFrame) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for dtype in df.dtypes() {
        *counts.entry(dtype_label(&dtype)).or_insert(0) += 1;
    }
    counts
}

fn dtype_label(dtype: &DataType) -> String {
    match dtype {
        DataType::String => "str".to_string(),
        DataType::Float64 => "f64".to_string(),
        other => other.to_string(),
    }
}
