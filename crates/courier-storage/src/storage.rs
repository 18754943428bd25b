//! One feature's queue: directory, orchestrator, writer and reader wired
//! together.

use std::path::Path;
use std::sync::Arc;

use courier_common::{Clock, Feature, StorageConfig};
use tracing::info;

use crate::directory::QueueDirectory;
use crate::error::StorageError;
use crate::orchestrator::{FilesOrchestrator, QueueStatus};
use crate::reader::FileReader;
use crate::writer::FileWriter;

pub struct FeatureStorage {
    feature: Feature,
    orchestrator: Arc<FilesOrchestrator>,
    writer: FileWriter,
    reader: Arc<FileReader>,
}

impl FeatureStorage {
    /// Open `<root>/<feature directory>`, creating it if needed.
    pub fn open(
        root: &Path,
        feature: Feature,
        config: StorageConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let directory = QueueDirectory::open(root.join(feature.directory_name()))?;
        info!(
            feature = %feature,
            directory = %directory.path().display(),
            "opened queue"
        );

        let orchestrator = Arc::new(FilesOrchestrator::new(directory, config, clock));
        let format = feature.data_format();
        Ok(Self {
            feature,
            writer: FileWriter::new(Arc::clone(&orchestrator), format.clone()),
            reader: Arc::new(FileReader::new(Arc::clone(&orchestrator), format)),
            orchestrator,
        })
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    pub fn writer(&self) -> &FileWriter {
        &self.writer
    }

    /// Shared so an upload scheduler can drain the queue on its own thread.
    pub fn reader(&self) -> Arc<FileReader> {
        Arc::clone(&self.reader)
    }

    pub fn orchestrator(&self) -> &FilesOrchestrator {
        &self.orchestrator
    }

    pub fn status(&self) -> Result<QueueStatus, StorageError> {
        self.orchestrator.status()
    }

    /// Delete every queued file. Returns how many were deleted.
    pub fn purge(&self) -> Result<usize, StorageError> {
        let count = self.orchestrator.purge_all()?;
        info!(feature = %self.feature, files = count, "purged queue");
        Ok(count)
    }
}
