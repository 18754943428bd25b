//! Network primitive for delivering one payload.
//!
//! [`Transport`] performs a single POST and reports the HTTP status. It never
//! interprets the status; classification belongs to the uploader.

use std::time::Duration;

use courier_common::{Feature, UploadConfig};
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_CLIENT_TOKEN: &str = "X-Courier-Token";
pub const HEADER_REQUEST_ID: &str = "X-Courier-Request-Id";
pub const HEADER_EVP_ORIGIN: &str = "X-Courier-Evp-Origin";

/// A request that never reached a collector response.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("dns lookup failed: {0}")]
    Dns(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// One fully prepared upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// Unique per attempt, also sent as a header.
    pub id: String,
    /// `endpoint + intake path`, without query.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl UploadRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends a request and returns the HTTP status code.
pub trait Transport: Send + Sync {
    fn send(&self, request: &UploadRequest) -> Result<u16, TransportError>;
}

/// Builds [`UploadRequest`]s for one feature.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    url: String,
    source: String,
    client_token: Option<String>,
    content_type: &'static str,
    user_agent: String,
}

impl RequestBuilder {
    pub fn new(config: &UploadConfig, feature: Feature) -> courier_common::Result<Self> {
        let endpoint = config.endpoint.trim_end_matches('/');
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(courier_common::Error::InvalidEndpoint(config.endpoint.clone()));
        }
        Ok(Self {
            url: format!("{}{}", endpoint, feature.intake_path()),
            source: config.source.clone(),
            client_token: config.client_token.clone(),
            content_type: feature.content_type(),
            user_agent: format!("courier/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn build(&self, payload: Vec<u8>) -> UploadRequest {
        let id = Uuid::new_v4().to_string();
        let mut headers = vec![
            (HEADER_CONTENT_TYPE.to_string(), self.content_type.to_string()),
            (HEADER_USER_AGENT.to_string(), self.user_agent.clone()),
            (HEADER_REQUEST_ID.to_string(), id.clone()),
            (HEADER_EVP_ORIGIN.to_string(), self.source.clone()),
        ];
        if let Some(token) = &self.client_token {
            headers.push((HEADER_CLIENT_TOKEN.to_string(), token.clone()));
        }
        UploadRequest {
            id,
            url: self.url.clone(),
            query: vec![("source".to_string(), self.source.clone())],
            headers,
            body: payload,
        }
    }
}

/// [`Transport`] over HTTPS using a blocking `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            // a redirect is reported as-is and retried later
            .redirects(0)
            .build();
        Self { agent, timeout }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &UploadRequest) -> Result<u16, TransportError> {
        let mut call = self.agent.post(&request.url);
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        trace!(request_id = %request.id, url = %request.url, bytes = request.body.len(), "sending");
        match call.send_bytes(&request.body) {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(ureq::Error::Transport(transport)) => Err(self.classify(transport)),
        }
    }
}

impl HttpTransport {
    fn classify(&self, transport: ureq::Transport) -> TransportError {
        let message = transport.to_string();
        match transport.kind() {
            ureq::ErrorKind::Dns => TransportError::Dns(message),
            ureq::ErrorKind::ConnectionFailed
            | ureq::ErrorKind::ProxyConnect
            | ureq::ErrorKind::ProxyUnauthorized => TransportError::Connection(message),
            ureq::ErrorKind::InvalidUrl
            | ureq::ErrorKind::UnknownScheme
            | ureq::ErrorKind::InvalidProxyUrl
            | ureq::ErrorKind::BadHeader => TransportError::InvalidRequest(message),
            ureq::ErrorKind::Io if message.contains("timed out") => {
                TransportError::Timeout(self.timeout)
            }
            _ => TransportError::Io(message),
        }
    }
}
