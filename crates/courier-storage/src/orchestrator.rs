//! Rotation and upload-eligibility policy for one queue directory.
//!
//! The orchestrator decides, for every write, whether the current writable
//! file can take the record or a new file must be started, and for every read
//! cycle which closed file (if any) the reader may take.
//!
//! The writable file is closed by age alone once it reaches
//! `max_file_age_for_write`, so a queue that goes quiet still hands its last
//! file to the reader without waiting for another write.
//!
//! # Purges
//!
//! Data is deleted without upload in two situations, both deliberate and
//! bounded:
//! - **Directory budget**: before a new file is created, the oldest files are
//!   deleted until the directory is below `max_directory_size`.
//! - **Orphans**: every read cycle deletes files older than
//!   `max_file_age_for_read`, whether or not they were ever eligible.
//!
//! Every deletion goes through [`FilesOrchestrator::delete`] and is logged
//! with a [`PurgeReason`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use courier_common::clock::{self, Clock};
use courier_common::StorageConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::directory::QueueDirectory;
use crate::error::StorageError;
use crate::file::ByteFile;

/// Why a file was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeReason {
    /// Collector accepted the payload.
    UploadSucceeded,
    /// Collector rejected the payload permanently.
    UploadRejected { status: Option<u16> },
    /// File could not be read back.
    Unreadable,
    /// File held no records.
    Empty,
    /// File outlived `max_file_age_for_read`.
    Orphaned { age_ms: u64 },
    /// Directory reached `max_directory_size`.
    DirectoryBudgetExceeded { budget_bytes: u64, used_bytes: u64 },
    /// Explicit purge of the whole queue.
    Purged,
}

impl PurgeReason {
    /// Deletions that lose data which was never delivered.
    pub fn is_data_loss(&self) -> bool {
        !matches!(
            self,
            PurgeReason::UploadSucceeded | PurgeReason::Empty | PurgeReason::Purged
        )
    }
}

/// Snapshot of a queue directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub directory: String,
    pub file_count: usize,
    pub total_bytes: u64,
    pub budget_bytes: u64,
    pub oldest_file_age_ms: Option<u64>,
    pub newest_file_age_ms: Option<u64>,
    /// Files the reader could take right now.
    pub eligible_files: usize,
    /// Files the next read cycle will delete.
    pub orphaned_files: usize,
    pub writable_file: Option<String>,
}

enum WritableSlot {
    NoCurrentFile,
    /// `reserved` counts the bytes promised to writers, whether or not their
    /// appends have landed yet.
    HasCurrentFile {
        file: Arc<ByteFile>,
        writes: u64,
        reserved: u64,
    },
}

struct WriteState {
    slot: WritableSlot,
    /// Instant of the most recently created file, so the next one is strictly later.
    last_created_at: Option<DateTime<Utc>>,
}

pub struct FilesOrchestrator {
    directory: QueueDirectory,
    config: StorageConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<WriteState>,
}

impl FilesOrchestrator {
    pub fn new(directory: QueueDirectory, config: StorageConfig, clock: Arc<dyn Clock>) -> Self {
        // Files left by a previous run must not collide with new names.
        let last_created_at = directory
            .files()
            .ok()
            .and_then(|files| files.last().map(ByteFile::created_at));

        Self {
            directory,
            config,
            clock,
            state: Mutex::new(WriteState {
                slot: WritableSlot::NoCurrentFile,
                last_created_at,
            }),
        }
    }

    pub fn directory(&self) -> &QueueDirectory {
        &self.directory
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// File the next `next_write_size` bytes should be appended to.
    ///
    /// Reuses the current writable file unless it is too old, too full, would
    /// overflow with this write, or already holds `max_records_per_file`
    /// records; otherwise rotates to a new file. The bytes are reserved
    /// before the lock is released, so concurrent writers cannot overshoot
    /// `max_file_size` between the check and their append.
    pub fn file_for_writing(&self, next_write_size: u64) -> Result<Arc<ByteFile>, StorageError> {
        let now = self.clock.now();
        let mut state = self.lock_state();

        if let WritableSlot::HasCurrentFile {
            file,
            writes,
            reserved,
        } = &mut state.slot
        {
            if self.can_reuse(file, *writes, *reserved, next_write_size, now) {
                *writes += 1;
                *reserved = reserved.saturating_add(next_write_size);
                return Ok(Arc::clone(file));
            }
            debug!(
                file = %file.name(),
                size = file.size(),
                reserved = *reserved,
                writes = *writes,
                "rotating writable file"
            );
        }
        state.slot = WritableSlot::NoCurrentFile;

        self.enforce_directory_budget()?;

        let at = match state.last_created_at {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        };
        let file = Arc::new(self.directory.create_file(at)?);
        state.last_created_at = Some(file.created_at());
        state.slot = WritableSlot::HasCurrentFile {
            file: Arc::clone(&file),
            writes: 1,
            reserved: next_write_size,
        };
        Ok(file)
    }

    fn can_reuse(
        &self,
        file: &ByteFile,
        writes: u64,
        reserved: u64,
        next_write_size: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let size = file.size().max(reserved);
        self.is_open_for_writing(file, now)
            && size < self.config.max_file_size
            && size.saturating_add(next_write_size) <= self.config.max_file_size
            && writes < self.config.max_records_per_file
    }

    fn is_open_for_writing(&self, file: &ByteFile, now: DateTime<Utc>) -> bool {
        clock::age(now, file.created_at()) < self.config.max_file_age_for_write()
    }

    /// Name of the writable file while it still accepts writes.
    fn open_file_name(&self, state: &WriteState, now: DateTime<Utc>) -> Option<String> {
        match &state.slot {
            WritableSlot::HasCurrentFile { file, .. } if self.is_open_for_writing(file, now) => {
                Some(file.name().to_string())
            }
            _ => None,
        }
    }

    /// Delete the oldest files until the directory is below its budget.
    fn enforce_directory_budget(&self) -> Result<(), StorageError> {
        let files = self.directory.files()?;
        let budget = self.config.max_directory_size;
        let mut used: u64 = files.iter().map(ByteFile::size).sum();
        if used < budget {
            return Ok(());
        }

        let used_before = used;
        for file in &files {
            if used < budget {
                break;
            }
            self.delete(
                file,
                PurgeReason::DirectoryBudgetExceeded {
                    budget_bytes: budget,
                    used_bytes: used_before,
                },
            );
            used = used.saturating_sub(file.size());
        }
        Ok(())
    }

    /// Oldest closed file old enough to upload, skipping `excluded` names.
    ///
    /// Orphans are swept first, on every call, whether or not anything is
    /// eligible. The current writable file is never returned while it still
    /// accepts writes; once it is too old to write to, the slot is closed and
    /// the file is treated like any other.
    pub fn file_for_reading(
        &self,
        excluded: &HashSet<String>,
    ) -> Result<Option<ByteFile>, StorageError> {
        let now = self.clock.now();
        let writable = {
            let mut state = self.lock_state();
            let open = self.open_file_name(&state, now);
            if open.is_none() {
                if let WritableSlot::HasCurrentFile { file, writes, .. } = &state.slot {
                    debug!(file = %file.name(), writes = *writes, "closing idle writable file");
                    state.slot = WritableSlot::NoCurrentFile;
                }
            }
            open
        };
        let min_age = self.config.min_file_age_for_read();
        let max_age = self.config.max_file_age_for_read();

        let mut candidate = None;
        for file in self.directory.files()? {
            if writable.as_deref() == Some(file.name()) {
                continue;
            }
            let age = clock::age(now, file.created_at());
            if age > max_age {
                self.delete(
                    &file,
                    PurgeReason::Orphaned {
                        age_ms: age.as_millis() as u64,
                    },
                );
                continue;
            }
            if candidate.is_none() && age >= min_age && !excluded.contains(file.name()) {
                candidate = Some(file);
            }
        }
        Ok(candidate)
    }

    /// Delete `file`, logging why.
    pub fn delete(&self, file: &ByteFile, reason: PurgeReason) {
        if !file.delete() {
            return;
        }
        if reason.is_data_loss() {
            warn!(
                file = %file.name(),
                bytes = file.size(),
                ?reason,
                "dropped undelivered batch file"
            );
        } else if reason == PurgeReason::Purged {
            info!(file = %file.name(), bytes = file.size(), ?reason, "purged batch file");
        } else {
            debug!(file = %file.name(), bytes = file.size(), ?reason, "deleted batch file");
        }
    }

    /// Delete every file in the queue, including the writable one.
    pub fn purge_all(&self) -> Result<usize, StorageError> {
        let mut state = self.lock_state();
        state.slot = WritableSlot::NoCurrentFile;
        let files = self.directory.files()?;
        for file in &files {
            self.delete(file, PurgeReason::Purged);
        }
        Ok(files.len())
    }

    /// Name of the current writable file, if any is still accepting writes.
    pub fn writable_file_name(&self) -> Option<String> {
        let now = self.clock.now();
        self.open_file_name(&self.lock_state(), now)
    }

    /// Describe the queue without modifying it.
    pub fn status(&self) -> Result<QueueStatus, StorageError> {
        let now = self.clock.now();
        let files = self.directory.files()?;
        let writable = self.open_file_name(&self.lock_state(), now);
        let min_age = self.config.min_file_age_for_read();
        let max_age = self.config.max_file_age_for_read();

        let ages: Vec<_> = files
            .iter()
            .map(|f| clock::age(now, f.created_at()))
            .collect();
        let closed = files
            .iter()
            .zip(&ages)
            .filter(|(f, _)| writable.as_deref() != Some(f.name()));

        Ok(QueueStatus {
            directory: self.directory.path().display().to_string(),
            file_count: files.len(),
            total_bytes: files.iter().map(ByteFile::size).sum(),
            budget_bytes: self.config.max_directory_size,
            oldest_file_age_ms: ages.first().map(|a| a.as_millis() as u64),
            newest_file_age_ms: ages.last().map(|a| a.as_millis() as u64),
            eligible_files: closed
                .clone()
                .filter(|(_, age)| **age >= min_age && **age <= max_age)
                .count(),
            orphaned_files: closed.filter(|(_, age)| **age > max_age).count(),
            writable_file: writable,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, WriteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
