pub mod merge;
pub mod schema;

pub use schema::*;

use crate::cli::{Cli, Commands};
use crate::error::ConfigError;
use crate::registry::store::default_dir;
use std::path::{Path, PathBuf};

/// File name of the optional config file inside the config directory.
pub const CONFIG_FILE: &str = "cogmesh.toml";

/// Load configuration by merging the config file and CLI sources.
/// Precedence: CLI > config file > defaults.
///
/// A missing config file is handled gracefully (defaults apply). A file
/// named explicitly with `--config` must exist and parse.
pub fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let file = match &cli.config {
        Some(path) => load_toml_file(path)?,
        None => {
            let dir = cli.config_dir.clone().or_else(default_dir);
            match dir {
                Some(dir) => load_optional(&dir.join(CONFIG_FILE)),
                None => {
                    tracing::debug!("Could not determine config directory");
                    PartialConfig::default()
                }
            }
        }
    };

    Ok(cli_to_partial(cli).with_fallback(file).finalize())
}

/// Load a config file that may be absent or broken; problems are logged and
/// defaults apply.
fn load_optional(path: &Path) -> PartialConfig {
    match load_toml_file(path) {
        Ok(partial) => partial,
        Err(ConfigError::IoError { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            PartialConfig::default()
        }
        Err(e) => {
            tracing::warn!("Ignoring config: {e}");
            PartialConfig::default()
        }
    }
}

/// Read and parse a TOML config file into a PartialConfig.
pub fn load_toml_file(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let config_file: ConfigFile =
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config_file.to_partial())
}

/// Convert CLI arguments to a PartialConfig for merging.
fn cli_to_partial(cli: &Cli) -> PartialConfig {
    let registry_dir: Option<PathBuf> = cli.config_dir.clone();
    match &cli.command {
        Commands::Watch { interval, timeout } => PartialConfig {
            registry_dir,
            health_interval_secs: *interval,
            heartbeat_timeout_secs: *timeout,
            ..Default::default()
        },
        _ => PartialConfig {
            registry_dir,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn reads_file_from_config_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "[orchestrator]\nheartbeat_timeout_secs = 90\nmailbox_capacity = 16\n",
        )
        .unwrap();
        let dir = tmp.path().to_str().unwrap();
        let cli = Cli::parse_from(["cogmesh", "--config-dir", dir, "watch", "--interval", "2"]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.health_interval_secs, 2);
        assert_eq!(config.heartbeat_timeout_secs, 90);
        assert_eq!(config.mailbox_capacity, 16);
        assert_eq!(config.registry_dir.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn registry_dir_from_file_used_without_cli_override() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "[registry]\ndir = \"/var/lib/cogmesh\"\n").unwrap();
        let cli = Cli::parse_from(["cogmesh", "--config", path.to_str().unwrap(), "types"]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.registry_dir, Some(PathBuf::from("/var/lib/cogmesh")));
    }

    #[test]
    fn explicit_broken_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.toml");
        std::fs::write(&path, "[orchestrator\n").unwrap();
        let cli = Cli::parse_from(["cogmesh", "--config", path.to_str().unwrap(), "types"]);

        let err = load_config(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn broken_default_config_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "not = [valid").unwrap();
        let dir = tmp.path().to_str().unwrap();
        let cli = Cli::parse_from(["cogmesh", "--config-dir", dir, "types"]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.mailbox_capacity, 100);
    }
}
