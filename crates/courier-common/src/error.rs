//! Error types for courier.
//!
//! Errors carry a stable code and a category so that an embedding SDK can
//! group them in its own diagnostics without string matching:
//! - 10-19: configuration errors
//! - 20-29: storage errors
//! - 30-39: upload errors
//! - 60-69: I/O and serialization errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for courier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and threshold errors.
    Config,
    /// Queue directory and batch file errors.
    Storage,
    /// Network delivery errors.
    Upload,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Upload => write!(f, "upload"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for courier.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid threshold `{field}`: {reason}")]
    InvalidThreshold { field: &'static str, reason: String },

    #[error("failed to parse config file {path}: {reason}")]
    ConfigParse { path: String, reason: String },

    // Storage errors (20-29)
    #[error("storage error: {0}")]
    Storage(String),

    #[error("queue directory unavailable: {path}")]
    DirectoryUnavailable { path: String },

    // Upload errors (30-39)
    #[error("upload error: {0}")]
    Upload(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidThreshold { .. } => 11,
            Error::ConfigParse { .. } => 12,
            Error::Storage(_) => 20,
            Error::DirectoryUnavailable { .. } => 21,
            Error::Upload(_) => 30,
            Error::InvalidEndpoint(_) => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidThreshold { .. } | Error::ConfigParse { .. } => {
                ErrorCategory::Config
            }
            Error::Storage(_) | Error::DirectoryUnavailable { .. } => ErrorCategory::Storage,
            Error::Upload(_) | Error::InvalidEndpoint(_) => ErrorCategory::Upload,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Configuration mistakes never fix themselves; I/O and network trouble
    /// often does.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_)
            | Error::InvalidThreshold { .. }
            | Error::ConfigParse { .. }
            | Error::InvalidEndpoint(_) => false,
            Error::Storage(_)
            | Error::DirectoryUnavailable { .. }
            | Error::Upload(_)
            | Error::Io(_)
            | Error::Json(_) => true,
        }
    }
}
