//! Assembly of per-feature queues and upload schedulers.
//!
//! A [`Pipeline`] owns, for every enabled feature, one [`FeatureStorage`]
//! (the on-disk queue) and one [`UploadScheduler`] (the consumer draining it).
//! Producers only ever call [`Pipeline::submit`], which never fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use courier_common::{Clock, CourierConfig, Feature, Result, SystemClock};
use courier_storage::{FeatureStorage, QueueStatus};
use courier_upload::{
    AlwaysAllowed, HostConditions, HttpTransport, RequestBuilder, TickOutcome, Transport,
    UploadDelay, UploadScheduler, Uploader,
};
use serde::Serialize;
use tracing::{info, warn};

struct FeatureChannel {
    storage: FeatureStorage,
    scheduler: UploadScheduler,
}

pub struct Pipeline {
    root: PathBuf,
    channels: Vec<FeatureChannel>,
}

/// Collaborators a host may replace before building a [`Pipeline`].
pub struct PipelineBuilder {
    config: CourierConfig,
    features: Vec<Feature>,
    transport: Option<Arc<dyn Transport>>,
    conditions: Arc<dyn HostConditions>,
    clock: Arc<dyn Clock>,
}

impl PipelineBuilder {
    pub fn new(config: CourierConfig) -> Self {
        Self {
            config,
            features: Feature::ALL.to_vec(),
            transport: None,
            conditions: Arc::new(AlwaysAllowed),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn features(mut self, features: &[Feature]) -> Self {
        self.features = features.to_vec();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn conditions(mut self, conditions: Arc<dyn HostConditions>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let root = self.config.root_dir();
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(HttpTransport::new(self.config.upload.request_timeout()))
        });

        let mut channels = Vec::with_capacity(self.features.len());
        for feature in self.features {
            let storage = FeatureStorage::open(
                &root,
                feature,
                self.config.storage.clone(),
                Arc::clone(&self.clock),
            )?;
            let requests = RequestBuilder::new(&self.config.upload, feature)?;
            let scheduler = UploadScheduler::new(
                feature,
                storage.reader(),
                Uploader::new(Arc::clone(&transport), requests),
                Arc::clone(&self.conditions),
                UploadDelay::from_config(&self.config.upload),
            );
            channels.push(FeatureChannel { storage, scheduler });
        }

        info!(root = %root.display(), features = channels.len(), "pipeline ready");
        Ok(Pipeline { root, channels })
    }
}

impl Pipeline {
    pub fn builder(config: CourierConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Pipeline with the HTTP transport, system clock and no host signal.
    pub fn open(config: CourierConfig) -> Result<Self> {
        PipelineBuilder::new(config).build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn features(&self) -> Vec<Feature> {
        self.channels.iter().map(|c| c.storage.feature()).collect()
    }

    fn channel(&self, feature: Feature) -> Option<&FeatureChannel> {
        self.channels.iter().find(|c| c.storage.feature() == feature)
    }

    /// Queue one encoded record. Never fails observably.
    pub fn submit(&self, feature: Feature, record: &[u8]) {
        match self.channel(feature) {
            Some(channel) => channel.storage.writer().write(record),
            None => warn!(feature = %feature, "feature not enabled, dropping record"),
        }
    }

    /// Encode `value` as JSON and queue it.
    pub fn submit_value<T: Serialize>(&self, feature: Feature, value: &T) {
        match self.channel(feature) {
            Some(channel) => channel.storage.writer().write_value(value),
            None => warn!(feature = %feature, "feature not enabled, dropping record"),
        }
    }

    /// Start every feature's background upload thread.
    pub fn start(&mut self) -> Result<()> {
        for channel in &mut self.channels {
            channel.scheduler.start()?;
        }
        Ok(())
    }

    /// Stop every background upload thread, letting in-flight uploads finish.
    pub fn stop(&mut self) {
        for channel in &mut self.channels {
            channel.scheduler.stop();
        }
    }

    /// Upload eligible batches of `feature` now, up to `max_ticks` attempts.
    pub fn flush(&self, feature: Feature, max_ticks: usize) -> Vec<TickOutcome> {
        self.channel(feature)
            .map(|c| c.scheduler.flush(max_ticks))
            .unwrap_or_default()
    }

    pub fn status(&self, feature: Feature) -> Result<Option<QueueStatus>> {
        match self.channel(feature) {
            Some(channel) => Ok(Some(channel.storage.status()?)),
            None => Ok(None),
        }
    }

    pub fn purge(&self, feature: Feature) -> Result<usize> {
        match self.channel(feature) {
            Some(channel) => Ok(channel.storage.purge()?),
            None => Ok(0),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use courier_common::ManualClock;
    use courier_upload::{TransportError, UploadRequest};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Collecting {
        bodies: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl Transport for Collecting {
        fn send(&self, request: &UploadRequest) -> std::result::Result<u16, TransportError> {
            self.bodies
                .lock()
                .unwrap()
                .push((request.url.clone(), request.body.clone()));
            Ok(202)
        }
    }

    fn config(root: &Path) -> CourierConfig {
        CourierConfig {
            root_dir: Some(root.to_path_buf()),
            ..CourierConfig::default()
        }
    }

    #[test]
    fn test_submit_and_flush_per_feature() {
        let root = tempdir().unwrap();
        let clock = ManualClock::new(chrono::Utc.with_ymd_and_hms(2019, 12, 15, 10, 0, 0).unwrap());
        let transport = Arc::new(Collecting::default());
        let pipeline = Pipeline::builder(config(root.path()))
            .transport(transport.clone())
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        pipeline.submit(Feature::Logs, b"{\"message\":\"a\"}");
        pipeline.submit_value(Feature::Traces, &serde_json::json!({"span": 1}));
        // no further writes: both files close by age alone
        clock.advance(Duration::from_secs(10));

        let outcomes = pipeline.flush(Feature::Logs, 10);
        assert!(matches!(outcomes[0], TickOutcome::Delivered { .. }));
        assert_eq!(outcomes.last(), Some(&TickOutcome::Idle));
        pipeline.flush(Feature::Traces, 10);

        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].0.ends_with("/api/v2/logs"));
        assert_eq!(bodies[0].1, b"[{\"message\":\"a\"}]");
        assert!(bodies[1].0.ends_with("/api/v2/spans"));
        assert_eq!(bodies[1].1, b"{\"span\":1}");
    }

    #[test]
    fn test_disabled_feature_is_ignored() {
        let root = tempdir().unwrap();
        let pipeline = Pipeline::builder(config(root.path()))
            .features(&[Feature::Logs])
            .transport(Arc::new(Collecting::default()))
            .build()
            .unwrap();

        pipeline.submit(Feature::Metrics, b"{}");
        assert_eq!(pipeline.features(), vec![Feature::Logs]);
        assert!(pipeline.status(Feature::Metrics).unwrap().is_none());
        assert!(!root.path().join("metrics-v1").exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let root = tempdir().unwrap();
        let mut config = config(root.path());
        config.storage.min_file_age_for_read_ms = config.storage.max_file_age_for_write_ms;
        assert!(Pipeline::builder(config)
            .transport(Arc::new(Collecting::default()))
            .build()
            .is_err());
    }

    #[test]
    fn test_purge_and_status() {
        let root = tempdir().unwrap();
        let pipeline = Pipeline::builder(config(root.path()))
            .transport(Arc::new(Collecting::default()))
            .build()
            .unwrap();
        pipeline.submit(Feature::Metrics, b"{\"v\":1}");

        let status = pipeline.status(Feature::Metrics).unwrap().unwrap();
        assert_eq!(status.file_count, 1);
        assert_eq!(pipeline.purge(Feature::Metrics).unwrap(), 1);
        assert_eq!(
            pipeline.status(Feature::Metrics).unwrap().unwrap().file_count,
            0
        );
    }
}
