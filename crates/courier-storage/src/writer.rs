//! Producer entry point.
//!
//! Producers never see storage errors: a record that cannot be persisted is
//! logged and dropped. There is no in-memory buffer and no retry.

use std::sync::Arc;

use courier_common::DataFormat;
use serde::Serialize;
use tracing::{info, trace, warn};

use crate::error::StorageError;
use crate::orchestrator::FilesOrchestrator;

pub struct FileWriter {
    orchestrator: Arc<FilesOrchestrator>,
    format: DataFormat,
}

impl FileWriter {
    pub fn new(orchestrator: Arc<FilesOrchestrator>, format: DataFormat) -> Self {
        Self {
            orchestrator,
            format,
        }
    }

    /// Persist one encoded record. Failures are logged, never returned.
    pub fn write(&self, record: &[u8]) {
        if let Err(e) = self.try_write(record) {
            Self::report_dropped(record.len(), &e);
        }
    }

    /// Encode `value` as JSON and persist it.
    pub fn write_value<T: Serialize>(&self, value: &T) {
        match serde_json::to_vec(value) {
            Ok(record) => self.write(&record),
            Err(e) => Self::report_dropped(0, &StorageError::from(e)),
        }
    }

    fn report_dropped(bytes: usize, error: &StorageError) {
        if error.is_transient() {
            info!(bytes, error = %error, "dropping record");
        } else {
            warn!(bytes, error = %error, "dropping record");
        }
    }

    /// Persist one record, reporting why it was not written.
    ///
    /// Returns the number of bytes appended, separator included. Empty
    /// records are ignored and report zero.
    pub fn try_write(&self, record: &[u8]) -> Result<u64, StorageError> {
        if record.is_empty() {
            trace!("ignoring empty record");
            return Ok(0);
        }
        let max = self.orchestrator.config().max_record_size;
        if record.len() as u64 > max {
            return Err(StorageError::RecordTooLarge {
                size: record.len() as u64,
                max,
            });
        }

        let next_write_size = (record.len() + self.format.separator.len()) as u64;
        let file = self.orchestrator.file_for_writing(next_write_size)?;
        let separator = &self.format.separator;
        file.append_with(|sink| {
            if !sink.is_empty() {
                sink.write(separator);
            }
            sink.write(record);
        })
    }
}
