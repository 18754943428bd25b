//! Error types for queue storage operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while creating, appending to, reading or listing
/// batch files.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The queue directory cannot be created or listed
    #[error("queue directory {path} unavailable: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A new batch file could not be created
    #[error("cannot create batch file {path}: {source}")]
    FileCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing batch file could not be opened
    #[error("cannot open batch file {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File name is not one produced by the naming codec
    #[error("not a batch file name: {0}")]
    InvalidFileName(String),

    /// The file was deleted by another actor before the append reached it
    #[error("batch file vanished before append: {0}")]
    FileVanished(PathBuf),

    /// Appending to a batch file failed
    #[error("append to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a batch file failed
    #[error("read of {path} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record exceeds the configured maximum record size
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLarge { size: u64, max: u64 },

    /// Record could not be encoded
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StorageError {
    /// Transient errors are expected to clear up on their own (disk briefly
    /// full, file deleted under a writer). Structural ones need the caller to
    /// degrade: drop the record or skip to the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::FileVanished(_) | StorageError::Write { .. }
        )
    }
}

impl From<StorageError> for courier_common::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Directory { path, .. } => courier_common::Error::DirectoryUnavailable {
                path: path.display().to_string(),
            },
            other => courier_common::Error::Storage(other.to_string()),
        }
    }
}
