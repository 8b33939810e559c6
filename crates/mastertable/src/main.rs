use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod report;

use commands::build::{handle_build, BuildArgs};
use commands::config::{handle_config, ConfigArgs};
use commands::tags::{handle_tags, TagsArgs};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch master table builder and tag definition converter", long_about = None)]
struct Cli {
    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the one-row-per-batch master table from the three plant exports
    Build(BuildArgs),
    /// Convert tag CSV exports into XML tag definitions
    Tags(TagsArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Build(args) => handle_build(args),
        Command::Tags(args) => handle_tags(args),
        Command::Config(args) => handle_config(args),
    }
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}
