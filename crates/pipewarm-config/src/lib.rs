//! CLI flags (`clap`) merged with an optional `pipewarm.toml`, producing a
//! validated [`ReplayConfig`].

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

/// `pipewarm <archive> [flags]`. Unknown flags are collected into `extra`
/// and ignored rather than rejected, so external launchers that pass their
/// own bookkeeping flags don't break a run.
#[derive(Parser, Debug)]
#[command(name = "pipewarm", author, version, about = "Pre-warm a Vulkan driver's pipeline cache from a capture archive")]
pub struct Cli {
    /// Path to the capture archive.
    pub archive: PathBuf,

    /// Worker thread count. Defaults to `std::thread::available_parallelism()`.
    #[arg(long)]
    pub num_threads: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub enable_validation: bool,

    /// Index into the list of enumerated physical devices.
    #[arg(long)]
    pub device_index: Option<u32>,

    /// Path to an on-disk pipeline cache the driver should seed from/into.
    #[arg(long)]
    pub on_disk_pipeline_cache: Option<PathBuf>,

    /// Path to a progress ring-buffer file an external observer can poll.
    #[arg(long)]
    pub progress_file: Option<PathBuf>,

    /// Path to a `pipewarm.toml` overriding the defaults below. Defaults to
    /// `pipewarm.toml` in the working directory if present.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub extra: Vec<String>,
}

/// The subset of settings a launcher may prefer to pin in a file rather
/// than pass as flags every invocation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TomlDefaults {
    num_threads: Option<usize>,
    enable_validation: Option<bool>,
    log_level: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

/// Fully resolved settings for one replay run: CLI flags take precedence
/// over `pipewarm.toml`, which takes precedence over built-in defaults.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub archive: PathBuf,
    pub num_threads: usize,
    pub enable_validation: bool,
    pub device_index: Option<u32>,
    pub on_disk_pipeline_cache: Option<PathBuf>,
    pub progress_file: Option<PathBuf>,
    pub log_level: String,
}

impl ReplayConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let defaults = match &cli.config_file {
            Some(path) => load_toml(path)?,
            None => {
                let implicit = PathBuf::from("pipewarm.toml");
                if implicit.is_file() {
                    load_toml(&implicit)?
                } else {
                    TomlDefaults::default()
                }
            }
        };

        let num_threads = cli
            .num_threads
            .or(defaults.num_threads)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));

        Ok(Self {
            archive: cli.archive,
            num_threads,
            enable_validation: cli.enable_validation || defaults.enable_validation.unwrap_or(false),
            device_index: cli.device_index,
            on_disk_pipeline_cache: cli.on_disk_pipeline_cache,
            progress_file: cli.progress_file,
            log_level: defaults.log_level.unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn load_toml(path: &std::path::Path) -> Result<TomlDefaults, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_thread_count_to_available_parallelism() {
        let cli = Cli {
            archive: PathBuf::from("capture.bin"),
            num_threads: None,
            enable_validation: false,
            device_index: None,
            on_disk_pipeline_cache: None,
            progress_file: None,
            config_file: None,
            extra: Vec::new(),
        };
        let config = ReplayConfig::from_cli(cli).unwrap();
        assert!(config.num_threads >= 1);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn cli_num_threads_overrides_default() {
        let cli = Cli {
            archive: PathBuf::from("capture.bin"),
            num_threads: Some(7),
            enable_validation: true,
            device_index: Some(0),
            on_disk_pipeline_cache: None,
            progress_file: None,
            config_file: None,
            extra: Vec::new(),
        };
        let config = ReplayConfig::from_cli(cli).unwrap();
        assert_eq!(config.num_threads, 7);
        assert!(config.enable_validation);
    }

    #[test]
    fn missing_config_file_is_an_error_not_a_silent_default() {
        let cli = Cli {
            archive: PathBuf::from("capture.bin"),
            num_threads: None,
            enable_validation: false,
            device_index: None,
            on_disk_pipeline_cache: None,
            progress_file: None,
            config_file: Some(PathBuf::from("/nonexistent/pipewarm.toml")),
            extra: Vec::new(),
        };
        assert!(matches!(ReplayConfig::from_cli(cli), Err(ConfigError::Read { .. })));
    }
}
