//! The directory a queue owns.
//!
//! Only files whose names decode through [`crate::naming`] belong to the
//! queue. Anything else found in the directory is skipped during enumeration
//! and never deleted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::error::StorageError;
use crate::file::ByteFile;
use crate::naming;

#[derive(Debug, Clone)]
pub struct QueueDirectory {
    path: PathBuf,
}

impl QueueDirectory {
    /// Open the directory, creating it and its parents if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        fs::create_dir_all(&path).map_err(|source| StorageError::Directory {
            path: path.clone(),
            source,
        })?;
        if !path.is_dir() {
            return Err(StorageError::Directory {
                source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
                path,
            });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All queue files, oldest first.
    ///
    /// Files that disappear between listing and opening are skipped.
    pub fn files(&self) -> Result<Vec<ByteFile>, StorageError> {
        let entries = fs::read_dir(&self.path).map_err(|source| StorageError::Directory {
            path: self.path.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Directory {
                path: self.path.clone(),
                source,
            })?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if naming::decode(name).is_none() {
                trace!(name, "skipping foreign file");
                continue;
            }
            match ByteFile::open_existing(&entry.path()) {
                Ok(file) => files.push(file),
                Err(e) => debug!(name, error = %e, "skipping unreadable entry"),
            }
        }

        files.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(files)
    }

    /// Create a new empty file named after `at`.
    pub fn create_file(&self, at: DateTime<Utc>) -> Result<ByteFile, StorageError> {
        ByteFile::create_new(&self.path, at)
    }

    /// Open the queue file called `name`.
    pub fn file(&self, name: &str) -> Result<ByteFile, StorageError> {
        if naming::decode(name).is_none() {
            return Err(StorageError::InvalidFileName(name.to_string()));
        }
        ByteFile::open_existing(&self.path.join(name))
    }

    /// Sum of the sizes of all queue files.
    pub fn total_size(&self) -> Result<u64, StorageError> {
        Ok(self.files()?.iter().map(ByteFile::size).sum())
    }

    /// Delete every queue file, leaving foreign files alone.
    ///
    /// Returns the number of files deleted.
    pub fn delete_all_files(&self) -> Result<usize, StorageError> {
        let files = self.files()?;
        let mut deleted = 0;
        for file in &files {
            if file.delete() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_576_404_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/logs-v1");
        let queue = QueueDirectory::open(&path).unwrap();
        assert!(queue.path().is_dir());
    }

    #[test]
    fn test_open_over_regular_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("occupied");
        fs::write(&path, b"x").unwrap();
        assert!(matches!(
            QueueDirectory::open(&path),
            Err(StorageError::Directory { .. })
        ));
    }

    #[test]
    fn test_files_sorted_oldest_first() {
        let dir = tempdir().unwrap();
        let queue = QueueDirectory::open(dir.path()).unwrap();
        queue.create_file(at(20)).unwrap();
        queue.create_file(at(0)).unwrap();
        queue.create_file(at(10)).unwrap();

        let names: Vec<_> = queue
            .files()
            .unwrap()
            .iter()
            .map(|f| f.created_at())
            .collect();
        assert_eq!(names, vec![at(0), at(10), at(20)]);
    }

    #[test]
    fn test_foreign_files_ignored_and_preserved() {
        let dir = tempdir().unwrap();
        let queue = QueueDirectory::open(dir.path()).unwrap();
        queue.create_file(at(0)).unwrap().append(b"abc").unwrap();
        fs::write(dir.path().join("README"), b"not ours").unwrap();
        fs::create_dir(dir.path().join("1576404099000")).unwrap();

        assert_eq!(queue.files().unwrap().len(), 1);
        assert_eq!(queue.total_size().unwrap(), 3);

        assert_eq!(queue.delete_all_files().unwrap(), 1);
        assert!(dir.path().join("README").exists());
        assert!(queue.files().unwrap().is_empty());
    }

    #[test]
    fn test_file_by_name() {
        let dir = tempdir().unwrap();
        let queue = QueueDirectory::open(dir.path()).unwrap();
        let created = queue.create_file(at(5)).unwrap();

        let opened = queue.file(created.name()).unwrap();
        assert_eq!(opened.created_at(), at(5));
        assert!(matches!(
            queue.file("README"),
            Err(StorageError::InvalidFileName(_))
        ));
    }
}
