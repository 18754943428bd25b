//! Courier common types, clock and errors.
//!
//! This crate provides foundational types shared across the courier crates:
//! - The unified error type with categories
//! - An injectable clock so rotation and ageing are testable
//! - Telemetry feature kinds and their payload framing
//! - Configuration loading and validation

pub mod clock;
pub mod config;
pub mod error;
pub mod feature;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigPaths, ConfigResolver, CourierConfig, StorageConfig, UploadConfig};
pub use error::{Error, ErrorCategory, Result};
pub use feature::{DataFormat, Feature};
