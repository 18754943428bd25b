//! Exit codes for the courier CLI.
//!
//! Exit code ranges:
//! - 0-1: operational outcomes
//! - 10-19: user/environment errors
//! - 20-29: internal errors

use courier_common::{Error, ErrorCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command completed; nothing left behind.
    Clean = 0,
    /// Drain finished but batches remain queued for a later attempt.
    Pending = 1,

    /// Invalid arguments.
    ArgsError = 10,
    /// Configuration could not be loaded or is inconsistent.
    ConfigError = 11,
    /// Queue directory unusable.
    StorageError = 12,
    /// Collector unreachable or endpoint invalid.
    UploadError = 13,

    /// I/O error.
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::Pending)
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        match error.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Storage => ExitCode::StorageError,
            ErrorCategory::Upload => ExitCode::UploadError,
            ErrorCategory::Io => ExitCode::IoError,
        }
    }
}
