use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use mastertable_core::PipelineConfig;
use tracing::info;

pub const CONFIG_ENV: &str = "MASTERTABLE_CONFIG";

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// TOML configuration file (falls back to $MASTERTABLE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn handle_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

/// `--config` wins over the environment; neither means built-in defaults.
pub fn resolve_config_path(flag: Option<&Path>, env_value: Option<OsString>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf).or_else(|| {
        env_value
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

pub fn load_config(flag: Option<&Path>) -> Result<PipelineConfig> {
    match resolve_config_path(flag, std::env::var_os(CONFIG_ENV)) {
        Some(path) => {
            let config = PipelineConfig::load(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_environment() {
        let resolved = resolve_config_path(
            Some(Path::new("flag.toml")),
            Some(OsString::from("env.toml")),
        );
        assert_eq!(resolved, Some(PathBuf::from("flag.toml")));
    }

    #[test]
    fn environment_is_used_without_flag() {
        assert_eq!(
            resolve_config_path(None, Some(OsString::from("env.toml"))),
            Some(PathBuf::from("env.toml"))
        );
        assert_eq!(resolve_config_path(None, Some(OsString::new())), None);
        assert_eq!(resolve_config_path(None, None), None);
    }

    #[test]
    fn explicit_file_is_loaded_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        let bad = dir.path().join("bad.toml");
        std::fs::write(&good, "event_names = [\"E1\", \"E4\"]\n").unwrap();
        std::fs::write(&bad, "event_names = [\"E1\", \"E1\"]\n").unwrap();

        let config = load_config(Some(&good)).unwrap();
        assert_eq!(config.event_names, vec!["E1", "E4"]);

        let err = load_config(Some(&bad)).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate event name 'E1'"));
    }
}
