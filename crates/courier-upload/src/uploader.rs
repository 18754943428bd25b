//! Single-attempt upload and outcome classification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::transport::{RequestBuilder, Transport, TransportError};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Collector accepted the payload; delete it.
    Success { status: u16 },
    /// Try again later; keep the payload.
    RetryableFailure { status: Option<u16>, reason: String },
    /// Collector will never accept the payload; delete it.
    TerminalFailure { status: u16 },
}

impl UploadOutcome {
    /// Classify a collector response.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => UploadOutcome::Success { status },
            408 | 429 => UploadOutcome::RetryableFailure {
                status: Some(status),
                reason: "collector asked to retry".to_string(),
            },
            400..=499 => UploadOutcome::TerminalFailure { status },
            500..=599 => UploadOutcome::RetryableFailure {
                status: Some(status),
                reason: "collector error".to_string(),
            },
            _ => UploadOutcome::RetryableFailure {
                status: Some(status),
                reason: "unexpected status".to_string(),
            },
        }
    }

    pub fn from_transport_error(error: &TransportError) -> Self {
        UploadOutcome::RetryableFailure {
            status: None,
            reason: error.to_string(),
        }
    }

    /// Whether the payload should be deleted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadOutcome::RetryableFailure { .. })
    }
}

/// Uploads framed payloads for one feature.
pub struct Uploader {
    transport: Arc<dyn Transport>,
    requests: RequestBuilder,
}

impl Uploader {
    pub fn new(transport: Arc<dyn Transport>, requests: RequestBuilder) -> Self {
        Self {
            transport,
            requests,
        }
    }

    /// One attempt, no internal retry.
    pub fn upload(&self, payload: &[u8]) -> UploadOutcome {
        let request = self.requests.build(payload.to_vec());
        let outcome = match self.transport.send(&request) {
            Ok(status) => UploadOutcome::from_status(status),
            Err(e) => UploadOutcome::from_transport_error(&e),
        };

        match &outcome {
            UploadOutcome::Success { status } => {
                debug!(request_id = %request.id, status, bytes = payload.len(), "upload accepted");
            }
            UploadOutcome::RetryableFailure { status, reason } => {
                debug!(request_id = %request.id, ?status, reason = %reason, "upload will be retried");
            }
            UploadOutcome::TerminalFailure { status } => {
                warn!(request_id = %request.id, status, bytes = payload.len(), "upload rejected");
            }
        }
        outcome
    }
}
