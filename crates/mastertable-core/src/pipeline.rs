use std::path::PathBuf;

use mastertable_parser::{load_source_file, parse_source_table, SourceKind, SourceTable};
use polars::prelude::DataFrame;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::events::extract_event_windows;
use crate::master::{MasterRecordBuilder, MasterTable};
use crate::observer::{CountingObserver, PipelineObserver};
use crate::summary::{RunSummary, SourceSummary};
use crate::table::TimeSeriesTable;

#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub process: PathBuf,
    pub events: PathBuf,
    pub telemetry: PathBuf,
}

/// The three raw sources of one run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub process: SourceTable,
    pub events: SourceTable,
    pub telemetry: SourceTable,
}

impl PipelineInputs {
    /// Loads all three files. Any unreadable or headerless file fails the run.
    pub fn load(paths: &SourcePaths) -> Result<Self> {
        let inputs = Self {
            process: load_source_file(SourceKind::ProcessParameters, &paths.process)?,
            events: load_source_file(SourceKind::BatchEvents, &paths.events)?,
            telemetry: load_source_file(SourceKind::OperationalTelemetry, &paths.telemetry)?,
        };
        for source in [&inputs.process, &inputs.events, &inputs.telemetry] {
            info!(
                source = %source.kind,
                rows = source.height(),
                hash = %source.content_hash,
                "Loaded source"
            );
        }
        Ok(inputs)
    }

    pub fn from_strings(process: &str, events: &str, telemetry: &str) -> Result<Self> {
        Ok(Self {
            process: parse_source_table(SourceKind::ProcessParameters, process)?,
            events: parse_source_table(SourceKind::BatchEvents, events)?,
            telemetry: parse_source_table(SourceKind::OperationalTelemetry, telemetry)?,
        })
    }
}

pub struct PipelineOutput {
    pub master: MasterTable,
    pub dataframe: DataFrame,
    pub summary: RunSummary,
}

/// Normalizes the sources, extracts windows and builds the master table.
///
/// Returns `Err` only for fatal problems (missing key column, bad config);
/// everything else reaches `observer` and shows up as missing cells.
pub fn run_pipeline(
    config: &PipelineConfig,
    inputs: &PipelineInputs,
    observer: &dyn PipelineObserver,
) -> Result<PipelineOutput> {
    config.validate()?;
    let observer = CountingObserver::new(observer);

    let process = TimeSeriesTable::from_source(
        &inputs.process,
        &config.process.time_column,
        &config.process.columns(),
        &observer,
    )?;
    let telemetry = TimeSeriesTable::from_source(
        &inputs.telemetry,
        &config.telemetry.time_column,
        &config.telemetry.columns(),
        &observer,
    )?;
    let index = extract_event_windows(
        &inputs.events,
        &config.events,
        &config.event_names,
        &observer,
    )?;

    let master =
        MasterRecordBuilder::new(config, &process, &telemetry, &observer).build(&index)?;
    let dataframe = master.to_dataframe()?;

    let sources = vec![
        SourceSummary {
            kind: inputs.process.kind,
            content_hash: inputs.process.content_hash.clone(),
            rows_loaded: inputs.process.height(),
            rows_usable: process.len(),
        },
        SourceSummary {
            kind: inputs.events.kind,
            content_hash: inputs.events.content_hash.clone(),
            rows_loaded: inputs.events.height(),
            rows_usable: index.len(),
        },
        SourceSummary {
            kind: inputs.telemetry.kind,
            content_hash: inputs.telemetry.content_hash.clone(),
            rows_loaded: inputs.telemetry.height(),
            rows_usable: telemetry.len(),
        },
    ];
    let summary = RunSummary::new(
        sources,
        &dataframe,
        master.missing_cell_count(),
        observer.count(),
    );

    info!(
        run_id = %summary.run_id,
        batches = summary.batch_count,
        columns = summary.column_count,
        missing_cells = summary.missing_cells,
        warnings = summary.warning_count,
        "Master table built"
    );

    Ok(PipelineOutput {
        master,
        dataframe,
        summary,
    })
}
