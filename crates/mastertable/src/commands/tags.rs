use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mastertable_tags::{convert_file, resolve_inputs, ConversionOutcome};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Data source name written into every tag, e.g. "DATA_SOURCE_NAME"
    #[arg(short, long)]
    pub datasource: String,
    /// Tag CSV to convert; every *.csv in the current directory when omitted
    pub csv_file: Option<PathBuf>,
}

pub fn handle_tags(args: TagsArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let files = resolve_inputs(args.csv_file.as_deref(), &cwd)?;
    if files.is_empty() {
        warn!(dir = %cwd.display(), "No CSV files to convert");
        return Ok(());
    }

    let (mut written, mut skipped) = (0usize, 0usize);
    for file in &files {
        let outcome = convert_file(file, &args.datasource)
            .with_context(|| format!("failed to convert {}", file.display()))?;
        match outcome {
            ConversionOutcome::Written { path, .. } => {
                println!("XML file created: {}", path.display());
                written += 1;
            }
            ConversionOutcome::Skipped { .. } => {
                println!("Skipping file due to validation issues: {}", file.display());
                skipped += 1;
            }
        }
    }

    info!(written, skipped, "Tag conversion finished");
    Ok(())
}
