use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mastertable_core::outputs::write_master_table;
use mastertable_core::{run_pipeline, PipelineInputs, SourcePaths, TracingObserver};
use tracing::info;

use super::config::load_config;
use crate::report;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Process parameter export (Time, Parameter1..3)
    #[arg(long)]
    pub process: PathBuf,
    /// Batch event export (Batch_ID, E<n>_start, E<n>_end)
    #[arg(long)]
    pub events: PathBuf,
    /// Operational telemetry export (Time, valve_position, pump_speed)
    #[arg(long)]
    pub telemetry: PathBuf,
    /// Output file; `.parquet` writes Parquet, anything else CSV
    #[arg(long, default_value = "Master_table.csv")]
    pub output: PathBuf,
    /// Also write the run summary as JSON
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// TOML configuration file (falls back to $MASTERTABLE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Process batches on the rayon pool
    #[arg(long)]
    pub parallel: bool,
}

pub fn handle_build(args: BuildArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.parallel {
        config.parallel = true;
    }

    let inputs = PipelineInputs::load(&SourcePaths {
        process: args.process,
        events: args.events,
        telemetry: args.telemetry,
    })
    .context("failed to load input files")?;

    let output = run_pipeline(&config, &inputs, &TracingObserver)
        .context("failed to build master table")?;

    let format = write_master_table(&output.dataframe, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if let Some(path) = &args.summary {
        output
            .summary
            .write(path)
            .with_context(|| format!("failed to write run summary {}", path.display()))?;
        info!(path = %path.display(), "Wrote run summary");
    }

    println!("{}", report::summary_table(&output.summary, &args.output, format));
    if let Some(row) = output.master.rows().first() {
        println!("{}", report::batch_overview(row, output.master.parameter_labels()));
    }
    Ok(())
}
