//! Courier on-disk event queue.
//!
//! This crate provides:
//! - [`ByteFile`]: an append-only batch file with per-file serialized appends
//! - [`naming`]: the codec between creation instants and file names
//! - [`QueueDirectory`]: the directory a queue owns, whose listing is the index
//! - [`FilesOrchestrator`]: rotation, upload eligibility, orphan and budget purges
//! - [`FileWriter`] / [`FileReader`]: the producer and consumer entry points
//!
//! # Layout
//!
//! ```text
//! <root>/logs-v1/1576404000000
//! <root>/logs-v1/1576404004750
//! <root>/traces-v1/1576404001000
//! ```
//!
//! There is no manifest: after an unclean shutdown the directory listing is
//! already the complete state of the queue.

pub mod directory;
pub mod error;
pub mod file;
pub mod naming;
pub mod orchestrator;
pub mod reader;
pub mod storage;
pub mod writer;

pub use directory::QueueDirectory;
pub use error::StorageError;
pub use file::{AppendSink, ByteFile};
pub use orchestrator::{FilesOrchestrator, PurgeReason, QueueStatus};
pub use reader::{Batch, FileReader};
pub use storage::FeatureStorage;
pub use writer::FileWriter;
