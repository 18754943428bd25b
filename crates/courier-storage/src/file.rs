//! Append-only batch files.
//!
//! A [`ByteFile`] has two disjoint access modes: appending (while it is the
//! orchestrator's writable file) and whole-content read plus delete (once it
//! is closed and handed to the reader).
//!
//! Every append on one instance runs inside that instance's mutex, and all
//! chunks supplied by one call are written with a single `write_all`. Two
//! concurrent calls can therefore never interleave their chunks. Distinct
//! instances have independent mutexes.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::naming;

/// A single batch file identified by its creation instant.
#[derive(Debug)]
pub struct ByteFile {
    path: PathBuf,
    name: String,
    created_at: DateTime<Utc>,
    /// Bytes written so far; only mutated while `append_lock` is held.
    size: AtomicU64,
    append_lock: Mutex<()>,
}

/// Collects the chunks of one append call.
///
/// `is_empty` reflects the file as observed under the append lock, so a
/// writer can decide whether a separator is needed without racing other
/// writers.
pub struct AppendSink {
    file_was_empty: bool,
    buffer: Vec<u8>,
}

impl AppendSink {
    /// Whether the file held no bytes when this append started.
    pub fn is_empty(&self) -> bool {
        self.file_was_empty
    }

    /// Queue a chunk. Chunks are written in the order they are queued.
    pub fn write(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }
}

impl ByteFile {
    /// Create an empty file in `directory`, named after `at`.
    ///
    /// Fails if the directory is not writable or a file with that name exists.
    pub fn create_new(directory: &Path, at: DateTime<Utc>) -> Result<Self, StorageError> {
        let name = naming::encode(at);
        let path = directory.join(&name);

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| StorageError::FileCreation {
                path: path.clone(),
                source,
            })?;

        debug!(file = %name, "created batch file");

        Ok(Self {
            created_at: naming::truncate(at),
            path,
            name,
            size: AtomicU64::new(0),
            append_lock: Mutex::new(()),
        })
    }

    /// Open a file that already exists, inferring its creation instant from
    /// its name and its size from metadata.
    pub fn open_existing(path: &Path) -> Result<Self, StorageError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidFileName(path.display().to_string()))?
            .to_string();
        let created_at =
            naming::decode(&name).ok_or_else(|| StorageError::InvalidFileName(name.clone()))?;

        let metadata = fs::metadata(path).map_err(|source| StorageError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(StorageError::FileOpen {
                path: path.to_path_buf(),
                source: std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            name,
            created_at,
            size: AtomicU64::new(metadata.len()),
            append_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Tracked size in bytes. Does not touch the filesystem.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Append one chunk.
    pub fn append(&self, bytes: &[u8]) -> Result<u64, StorageError> {
        self.append_with(|sink| sink.write(bytes))
    }

    /// Append every chunk queued by `fill` as one contiguous unit.
    ///
    /// Returns the number of bytes written. If the file was deleted by
    /// another actor, fails with [`StorageError::FileVanished`] and does not
    /// recreate it. If the write itself fails part way, the file is truncated
    /// back to its previous length so no partial record is left behind.
    pub fn append_with<F>(&self, fill: F) -> Result<u64, StorageError>
    where
        F: FnOnce(&mut AppendSink),
    {
        let _guard = self.append_lock.lock().unwrap_or_else(|e| e.into_inner());

        let previous_size = self.size.load(Ordering::Acquire);
        let mut sink = AppendSink {
            file_was_empty: previous_size == 0,
            buffer: Vec::new(),
        };
        fill(&mut sink);
        if sink.buffer.is_empty() {
            return Ok(0);
        }

        let mut file = match OpenOptions::new().append(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::FileVanished(self.path.clone()));
            }
            Err(source) => {
                return Err(StorageError::Write {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if let Err(source) = file.write_all(&sink.buffer) {
            rollback(&file, &self.path, previous_size);
            return Err(StorageError::Write {
                path: self.path.clone(),
                source,
            });
        }

        let written = sink.buffer.len() as u64;
        self.size.store(previous_size + written, Ordering::Release);
        Ok(written)
    }

    /// Read the whole file.
    pub fn read_all(&self) -> Result<Vec<u8>, StorageError> {
        fs::read(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })
    }

    /// Delete the file. A file that is already gone counts as deleted.
    ///
    /// Returns `false` only if the file still exists afterwards.
    pub fn delete(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(file = %self.name, error = %e, "failed to delete batch file");
                false
            }
        }
    }
}

fn rollback(file: &File, path: &Path, previous_size: u64) {
    if let Err(e) = file.set_len(previous_size) {
        warn!(
            path = %path.display(),
            error = %e,
            "failed to roll back partial append"
        );
    }
}
