//! Drives the consume-upload cycle for one feature.
//!
//! [`UploadScheduler::tick`] is one synchronous iteration: ask the host,
//! take the oldest eligible batch, upload it once, and delete or keep it
//! depending on the outcome. [`UploadScheduler::start`] runs ticks on a
//! background thread separated by the adaptive [`UploadDelay`].
//!
//! Stop requests are honoured only between ticks, so an upload that has
//! started always completes and its outcome is always applied.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use courier_common::Feature;
use courier_storage::{FileReader, PurgeReason};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conditions::HostConditions;
use crate::delay::UploadDelay;
use crate::uploader::{UploadOutcome, Uploader};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tick", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Host conditions discouraged uploading; nothing was read.
    Suspended,
    /// No eligible batch.
    Idle,
    /// Batch accepted and deleted.
    Delivered { batch: String },
    /// Batch permanently rejected and deleted.
    Rejected { batch: String, status: u16 },
    /// Batch kept for a later attempt.
    Retrying { batch: String, attempts: u32 },
}

/// Delivery history of a batch that has failed at least once.
///
/// Held in memory only; a restart forgets it and the batch is simply sent
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempts: u32,
    pub last_failure: UploadOutcome,
}

struct SchedulerCore {
    feature: Feature,
    reader: Arc<FileReader>,
    uploader: Uploader,
    conditions: Arc<dyn HostConditions>,
    delay: Mutex<UploadDelay>,
    attempts: Mutex<HashMap<String, AttemptRecord>>,
    /// Serialises ticks from the background thread and `flush`.
    tick_lock: Mutex<()>,
    stop_requested: Mutex<bool>,
    wake: Condvar,
}

pub struct UploadScheduler {
    core: Arc<SchedulerCore>,
    thread: Option<thread::JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl UploadScheduler {
    pub fn new(
        feature: Feature,
        reader: Arc<FileReader>,
        uploader: Uploader,
        conditions: Arc<dyn HostConditions>,
        delay: UploadDelay,
    ) -> Self {
        Self {
            core: Arc::new(SchedulerCore {
                feature,
                reader,
                uploader,
                conditions,
                delay: Mutex::new(delay),
                attempts: Mutex::new(HashMap::new()),
                tick_lock: Mutex::new(()),
                stop_requested: Mutex::new(false),
                wake: Condvar::new(),
            }),
            thread: None,
        }
    }

    /// Run one iteration of the consume-upload cycle.
    pub fn tick(&self) -> TickOutcome {
        self.core.tick()
    }

    /// Run ticks back to back until one is idle, suspended or retrying, or
    /// `max_ticks` ticks have run.
    pub fn flush(&self, max_ticks: usize) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..max_ticks {
            let outcome = self.core.tick();
            let done = matches!(
                outcome,
                TickOutcome::Idle | TickOutcome::Suspended | TickOutcome::Retrying { .. }
            );
            outcomes.push(outcome);
            if done {
                break;
            }
        }
        outcomes
    }

    /// Interval the background thread waits before its next tick.
    pub fn current_delay(&self) -> Duration {
        lock(&self.core.delay).current()
    }

    pub fn attempt_record(&self, batch: &str) -> Option<AttemptRecord> {
        lock(&self.core.attempts).get(batch).cloned()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Start ticking on a background thread. A no-op if already running.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        *lock(&self.core.stop_requested) = false;

        let core = Arc::clone(&self.core);
        let thread = thread::Builder::new()
            .name(format!("courier-upload-{}", self.core.feature))
            .spawn(move || core.run())?;
        info!(feature = %self.core.feature, "upload scheduler started");
        self.thread = Some(thread);
        Ok(())
    }

    /// Stop the background thread, waiting for any in-flight tick.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        *lock(&self.core.stop_requested) = true;
        self.core.wake.notify_all();
        if thread.join().is_err() {
            warn!(feature = %self.core.feature, "upload thread panicked");
        }
        info!(feature = %self.core.feature, "upload scheduler stopped");
    }
}

impl Drop for UploadScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SchedulerCore {
    fn run(&self) {
        loop {
            if *lock(&self.stop_requested) {
                break;
            }
            let outcome = self.tick();
            debug!(feature = %self.feature, ?outcome, "tick");

            let wait = lock(&self.delay).current();
            let stopped = lock(&self.stop_requested);
            let (stopped, _) = self
                .wake
                .wait_timeout_while(stopped, wait, |stop| !*stop)
                .unwrap_or_else(|e| e.into_inner());
            if *stopped {
                break;
            }
        }
    }

    fn tick(&self) -> TickOutcome {
        let _tick = lock(&self.tick_lock);

        if self.conditions.uploads_discouraged() {
            debug!(feature = %self.feature, "uploads discouraged by host");
            return TickOutcome::Suspended;
        }

        let batch = match self.reader.read_next_batch() {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                lock(&self.delay).increase();
                // nothing eligible means every tracked batch is gone
                lock(&self.attempts).clear();
                return TickOutcome::Idle;
            }
            Err(e) => {
                warn!(feature = %self.feature, error = %e, "cannot read queue");
                lock(&self.delay).increase();
                return TickOutcome::Idle;
            }
        };
        lock(&self.delay).reset();

        let id = batch.id().to_string();
        let outcome = self.uploader.upload(batch.payload());
        match outcome {
            UploadOutcome::Success { .. } => {
                lock(&self.attempts).remove(&id);
                self.reader
                    .mark_batch_as_read(batch, PurgeReason::UploadSucceeded);
                TickOutcome::Delivered { batch: id }
            }
            UploadOutcome::TerminalFailure { status } => {
                lock(&self.attempts).remove(&id);
                self.reader.mark_batch_as_read(
                    batch,
                    PurgeReason::UploadRejected {
                        status: Some(status),
                    },
                );
                TickOutcome::Rejected { batch: id, status }
            }
            UploadOutcome::RetryableFailure { .. } => {
                self.reader.release_batch(batch);
                let mut attempts = lock(&self.attempts);
                let record = attempts.entry(id.clone()).or_insert(AttemptRecord {
                    attempts: 0,
                    last_failure: outcome.clone(),
                });
                record.attempts += 1;
                record.last_failure = outcome;
                info!(
                    feature = %self.feature,
                    file = %id,
                    attempt = record.attempts,
                    "upload failed, batch kept"
                );
                TickOutcome::Retrying {
                    batch: id,
                    attempts: record.attempts,
                }
            }
        }
    }
}
