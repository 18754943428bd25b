//! Courier pipeline assembly.
//!
//! Ties the on-disk queues of `courier-storage` to the upload schedulers of
//! `courier-upload`, one pair per telemetry feature, and provides the logging
//! setup shared by the `courier` binary and embedding hosts.

pub mod exit_codes;
pub mod logging;
pub mod pipeline;

pub use exit_codes::ExitCode;
pub use pipeline::{Pipeline, PipelineBuilder};
