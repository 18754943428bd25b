//! Configuration for the courier pipeline.
//!
//! This module provides:
//! - Typed thresholds for the storage layer (rotation, eligibility, caps)
//! - Upload settings (endpoint, credentials, polling interval bounds)
//! - Deterministic config resolution (CLI > env > XDG > defaults)
//! - Semantic validation of threshold combinations

pub mod resolve;

pub use resolve::{ConfigPaths, ConfigResolution, ConfigResolver, ConfigSource};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Thresholds consumed by the files orchestrator and writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Rotate once a file reaches this many bytes.
    pub max_file_size: u64,
    /// Oldest data is purged once the queue directory reaches this many bytes.
    pub max_directory_size: u64,
    /// Rotate once the writable file is this old (milliseconds).
    pub max_file_age_for_write_ms: u64,
    /// A file becomes upload-eligible only after reaching this age (milliseconds).
    /// Must exceed `max_file_age_for_write_ms` so no file is read while written.
    pub min_file_age_for_read_ms: u64,
    /// Files older than this are deleted without upload (milliseconds).
    pub max_file_age_for_read_ms: u64,
    /// Rotate once this many records were written to the current file.
    pub max_records_per_file: u64,
    /// Records larger than this are dropped by the writer.
    pub max_record_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            max_file_size: 4 * MIB,
            max_directory_size: 512 * MIB,
            max_file_age_for_write_ms: 4_750,
            min_file_age_for_read_ms: 5_000,
            max_file_age_for_read_ms: 18 * 60 * 60 * 1_000,
            max_records_per_file: 500,
            max_record_size: 256 * KIB,
        }
    }
}

impl StorageConfig {
    pub fn max_file_age_for_write(&self) -> Duration {
        Duration::from_millis(self.max_file_age_for_write_ms)
    }

    pub fn min_file_age_for_read(&self) -> Duration {
        Duration::from_millis(self.min_file_age_for_read_ms)
    }

    pub fn max_file_age_for_read(&self) -> Duration {
        Duration::from_millis(self.max_file_age_for_read_ms)
    }

    /// Validate threshold combinations.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(invalid("max_file_size", "must be positive"));
        }
        if self.max_directory_size < self.max_file_size {
            return Err(invalid(
                "max_directory_size",
                "must be at least max_file_size",
            ));
        }
        if self.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file", "must be positive"));
        }
        if self.max_record_size == 0 || self.max_record_size > self.max_file_size {
            return Err(invalid(
                "max_record_size",
                "must be positive and no larger than max_file_size",
            ));
        }
        if self.min_file_age_for_read_ms <= self.max_file_age_for_write_ms {
            return Err(invalid(
                "min_file_age_for_read_ms",
                "must exceed max_file_age_for_write_ms",
            ));
        }
        if self.max_file_age_for_read_ms <= self.min_file_age_for_read_ms {
            return Err(invalid(
                "max_file_age_for_read_ms",
                "must exceed min_file_age_for_read_ms",
            ));
        }
        Ok(())
    }
}

/// Settings consumed by the uploader and the upload scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Collector base URL; the feature intake path is appended.
    pub endpoint: String,
    /// Client token sent with every request.
    pub client_token: Option<String>,
    /// Value of the `source` query parameter.
    pub source: String,
    /// Polling interval after a tick that found a file (milliseconds).
    pub base_upload_interval_ms: u64,
    /// Upper bound for the polling interval while idle (milliseconds).
    pub max_upload_interval_ms: u64,
    /// Growth factor applied per idle tick: `delay *= 1 + rate`.
    pub delay_change_rate: f64,
    /// Whole-request timeout (milliseconds).
    pub request_timeout_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            endpoint: "https://intake.courier.dev".to_string(),
            client_token: None,
            source: "rust".to_string(),
            base_upload_interval_ms: 5_000,
            max_upload_interval_ms: 20_000,
            delay_change_rate: 0.1,
            request_timeout_ms: 30_000,
        }
    }
}

impl UploadConfig {
    pub fn base_upload_interval(&self) -> Duration {
        Duration::from_millis(self.base_upload_interval_ms)
    }

    pub fn max_upload_interval(&self) -> Duration {
        Duration::from_millis(self.max_upload_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate interval bounds and endpoint shape.
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.base_upload_interval_ms == 0 {
            return Err(invalid("base_upload_interval_ms", "must be positive"));
        }
        if self.base_upload_interval_ms > self.max_upload_interval_ms {
            return Err(invalid(
                "max_upload_interval_ms",
                "must be at least base_upload_interval_ms",
            ));
        }
        if !self.delay_change_rate.is_finite() || self.delay_change_rate < 0.0 {
            return Err(invalid("delay_change_rate", "must be a non-negative number"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

/// The complete loaded configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Root directory holding one queue directory per feature.
    pub root_dir: Option<PathBuf>,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl CourierConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Root directory, falling back to the platform data directory.
    pub fn root_dir(&self) -> PathBuf {
        self.root_dir.clone().unwrap_or_else(default_root_dir)
    }

    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.upload.validate()?;
        Ok(())
    }
}

/// `$XDG_DATA_HOME/courier` (or the platform equivalent).
pub fn default_root_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("courier")
}

fn invalid(field: &'static str, reason: &str) -> Error {
    Error::InvalidThreshold {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CourierConfig::default();
        config.validate().unwrap();
        assert_eq!(config.storage.max_file_size, 4 * 1024 * 1024);
        assert_eq!(config.upload.base_upload_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_grace_window_must_exceed_write_age() {
        let config = StorageConfig {
            min_file_age_for_read_ms: 4_000,
            max_file_age_for_write_ms: 4_750,
            ..Default::default()
        };
        match config.validate() {
            Err(Error::InvalidThreshold { field, .. }) => {
                assert_eq!(field, "min_file_age_for_read_ms")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_orphan_age_must_exceed_grace_window() {
        let config = StorageConfig {
            max_file_age_for_read_ms: 5_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_record_size_bounded_by_file_size() {
        let config = StorageConfig {
            max_file_size: 1024,
            max_record_size: 2048,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upload_interval_bounds() {
        let config = UploadConfig {
            base_upload_interval_ms: 30_000,
            max_upload_interval_ms: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_scheme_required() {
        let config = UploadConfig {
            endpoint: "intake.example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidEndpoint(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CourierConfig::from_toml_str(
            r#"
            root_dir = "/var/lib/courier"

            [storage]
            max_file_size = 1024
            max_record_size = 512

            [upload]
            endpoint = "http://localhost:8080"
            client_token = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_dir(), PathBuf::from("/var/lib/courier"));
        assert_eq!(config.storage.max_file_size, 1024);
        assert_eq!(config.storage.max_records_per_file, 500);
        assert_eq!(config.upload.client_token.as_deref(), Some("abc"));
        assert_eq!(config.upload.max_upload_interval_ms, 20_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_malformed_toml() {
        let err = CourierConfig::from_toml_str("[storage\nmax_file_size = ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}
