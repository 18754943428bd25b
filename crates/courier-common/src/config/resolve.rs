//! Configuration resolution for courier.
//!
//! Implements a deterministic resolution order:
//! 1. Explicit CLI flag (`--config`)
//! 2. `COURIER_CONFIG` environment variable
//! 3. `$XDG_CONFIG_HOME/courier/courier.toml`
//! 4. `~/.config/courier/courier.toml` (platform config dir)
//! 5. Built-in defaults
//!
//! After loading, `COURIER_ENDPOINT` and `COURIER_CLIENT_TOKEN` override the
//! corresponding upload settings.

use std::env;
use std::fs;
use std::path::PathBuf;

use super::CourierConfig;
use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "courier.toml";

/// Configuration file paths supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit path to a config file.
    pub config_path: Option<PathBuf>,
}

/// How the config file was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// From explicit CLI flag
    CliFlag,
    /// From environment variable
    EnvVar,
    /// From XDG config directory
    XdgConfig,
    /// Using built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::CliFlag => write!(f, "cli"),
            ConfigResolution::EnvVar => write!(f, "env"),
            ConfigResolution::XdgConfig => write!(f, "xdg"),
            ConfigResolution::Default => write!(f, "default"),
        }
    }
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file, or None if using defaults
    pub path: Option<PathBuf>,
    pub resolution: ConfigResolution,
}

/// Configuration resolver with deterministic resolution order.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    cli_paths: ConfigPaths,
}

impl ConfigResolver {
    pub fn new(paths: ConfigPaths) -> Self {
        ConfigResolver { cli_paths: paths }
    }

    /// Create a resolver with no CLI overrides.
    pub fn with_defaults() -> Self {
        ConfigResolver::default()
    }

    /// Resolve the config file path.
    pub fn resolve_config_path(&self) -> (Option<PathBuf>, ConfigResolution) {
        // 1. CLI flag
        if let Some(ref path) = self.cli_paths.config_path {
            return (Some(path.clone()), ConfigResolution::CliFlag);
        }

        // 2. COURIER_CONFIG env var
        if let Ok(path) = env::var("COURIER_CONFIG") {
            return (Some(PathBuf::from(path)), ConfigResolution::EnvVar);
        }

        // 3. XDG_CONFIG_HOME/courier
        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg).join("courier").join(CONFIG_FILE_NAME);
            if path.exists() {
                return (Some(path), ConfigResolution::XdgConfig);
            }
        }

        // 4. platform config dir
        if let Some(dir) = dirs::config_dir() {
            let path = dir.join("courier").join(CONFIG_FILE_NAME);
            if path.exists() {
                return (Some(path), ConfigResolution::XdgConfig);
            }
        }

        // 5. Default
        (None, ConfigResolution::Default)
    }

    /// Load, apply env overrides and validate.
    pub fn load(&self) -> Result<(CourierConfig, ConfigSource)> {
        let (path, resolution) = self.resolve_config_path();

        let mut config = match &path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    Error::Config(format!("failed to read config from {}: {}", p.display(), e))
                })?;
                toml::from_str::<CourierConfig>(&content).map_err(|e| Error::ConfigParse {
                    path: p.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            None => CourierConfig::default(),
        };

        apply_env_overrides(&mut config);
        config.validate()?;

        Ok((config, ConfigSource { path, resolution }))
    }
}

fn apply_env_overrides(config: &mut CourierConfig) {
    if let Ok(endpoint) = env::var("COURIER_ENDPOINT") {
        config.upload.endpoint = endpoint;
    }
    if let Ok(token) = env::var("COURIER_CLIENT_TOKEN") {
        config.upload.client_token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cli_flag_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[storage]\nmax_records_per_file = 42\n").unwrap();

        let resolver = ConfigResolver::new(ConfigPaths {
            config_path: Some(path.clone()),
        });
        let (resolved, resolution) = resolver.resolve_config_path();
        assert_eq!(resolved, Some(path));
        assert_eq!(resolution, ConfigResolution::CliFlag);

        let (config, source) = resolver.load().unwrap();
        assert_eq!(config.storage.max_records_per_file, 42);
        assert_eq!(source.resolution, ConfigResolution::CliFlag);
    }

    #[test]
    fn test_missing_cli_file_is_an_error() {
        let dir = tempdir().unwrap();
        let resolver = ConfigResolver::new(ConfigPaths {
            config_path: Some(dir.path().join("absent.toml")),
        });
        assert!(matches!(resolver.load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_thresholds_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[storage]\nmax_file_size = 0\n").unwrap();

        let resolver = ConfigResolver::new(ConfigPaths {
            config_path: Some(path),
        });
        assert!(matches!(
            resolver.load(),
            Err(Error::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(ConfigResolution::CliFlag.to_string(), "cli");
        assert_eq!(ConfigResolution::Default.to_string(), "default");
    }
}
