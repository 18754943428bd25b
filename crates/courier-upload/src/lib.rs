//! Courier upload pipeline.
//!
//! This crate provides:
//! - [`Transport`] and its `ureq` implementation [`HttpTransport`]
//! - [`Uploader`]: one attempt per batch and the status classification
//! - [`HostConditions`]: host signals that pause uploading
//! - [`UploadDelay`]: the adaptive polling interval
//! - [`UploadScheduler`]: the tick loop that drains a feature's queue
//!
//! Delivery is at least once: a batch is deleted only after the collector
//! accepts or permanently rejects it, so a crash between sending and
//! deleting sends it again on the next run.

pub mod conditions;
pub mod delay;
pub mod scheduler;
pub mod transport;
pub mod uploader;

pub use conditions::{
    AlwaysAllowed, DeviceConditions, DeviceStatus, DeviceStatusProvider, HostConditions,
    SignalFlag,
};
pub use delay::UploadDelay;
pub use scheduler::{AttemptRecord, TickOutcome, UploadScheduler};
pub use transport::{HttpTransport, RequestBuilder, Transport, TransportError, UploadRequest};
pub use uploader::{UploadOutcome, Uploader};
