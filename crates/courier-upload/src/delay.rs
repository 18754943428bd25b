//! Adaptive polling interval.
//!
//! An idle queue is polled less and less often, up to a ceiling. The first
//! tick that finds a file snaps the interval back to the base.

use std::time::Duration;

use courier_common::UploadConfig;

#[derive(Debug, Clone)]
pub struct UploadDelay {
    base: Duration,
    max: Duration,
    change_rate: f64,
    current: Duration,
}

impl UploadDelay {
    pub fn new(base: Duration, max: Duration, change_rate: f64) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            change_rate: change_rate.max(0.0),
            current: base,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.base_upload_interval(),
            config.max_upload_interval(),
            config.delay_change_rate,
        )
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// A tick found nothing to upload.
    pub fn increase(&mut self) {
        self.current = self.current.mul_f64(1.0 + self.change_rate).min(self.max);
    }

    /// A tick found a file.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}
