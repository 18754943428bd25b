//! Consumer entry point.
//!
//! The reader hands out one closed file at a time as a framed payload and
//! deletes it once the caller reports a terminal outcome. A file that is
//! handed out stays in flight until it is marked read or released, so a
//! second consumer never receives the same file concurrently.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use courier_common::DataFormat;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::file::ByteFile;
use crate::orchestrator::{FilesOrchestrator, PurgeReason};

/// The contents of one batch file, ready to upload.
#[derive(Debug)]
pub struct Batch {
    file: ByteFile,
    payload: Vec<u8>,
}

impl Batch {
    /// Name of the file the batch was read from.
    pub fn id(&self) -> &str {
        self.file.name()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.file.created_at()
    }

    /// `prefix + contents + suffix`.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

pub struct FileReader {
    orchestrator: Arc<FilesOrchestrator>,
    format: DataFormat,
    in_flight: Mutex<HashSet<String>>,
}

impl FileReader {
    pub fn new(orchestrator: Arc<FilesOrchestrator>, format: DataFormat) -> Self {
        Self {
            orchestrator,
            format,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Oldest upload-eligible batch, or `None` when nothing is eligible.
    ///
    /// A file that cannot be read, or holds no bytes, is deleted and the next
    /// candidate is tried.
    pub fn read_next_batch(&self) -> Result<Option<Batch>, StorageError> {
        let mut in_flight = self.lock_in_flight();
        let mut skipped = in_flight.clone();

        while let Some(file) = self.orchestrator.file_for_reading(&skipped)? {
            let Some(contents) = self.load(&file) else {
                skipped.insert(file.name().to_string());
                continue;
            };
            debug!(file = %file.name(), bytes = contents.len(), "read batch");
            in_flight.insert(file.name().to_string());
            return Ok(Some(Batch {
                payload: self.format.frame(&contents),
                file,
            }));
        }
        Ok(None)
    }

    /// Contents of `file`, or `None` after deleting a file with nothing to upload.
    fn load(&self, file: &ByteFile) -> Option<Vec<u8>> {
        match file.read_all() {
            Ok(contents) if contents.is_empty() => {
                self.orchestrator.delete(file, PurgeReason::Empty);
                None
            }
            Ok(contents) => Some(contents),
            Err(e) => {
                warn!(file = %file.name(), error = %e, "batch file unreadable");
                self.orchestrator.delete(file, PurgeReason::Unreadable);
                None
            }
        }
    }

    /// Delete the batch's file after a terminal outcome.
    pub fn mark_batch_as_read(&self, batch: Batch, reason: PurgeReason) {
        self.orchestrator.delete(&batch.file, reason);
        self.lock_in_flight().remove(batch.id());
    }

    /// Keep the batch's file for a later attempt.
    pub fn release_batch(&self, batch: Batch) {
        self.lock_in_flight().remove(batch.id());
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
