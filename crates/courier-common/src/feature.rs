//! Telemetry features and how their records are framed for upload.

use serde::{Deserialize, Serialize};

/// A kind of telemetry. Each feature owns one queue directory and one
/// intake path on the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Logs,
    Traces,
    Metrics,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Logs, Feature::Traces, Feature::Metrics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Logs => "logs",
            Feature::Traces => "traces",
            Feature::Metrics => "metrics",
        }
    }

    /// Name of the queue directory under the storage root.
    pub fn directory_name(&self) -> &'static str {
        match self {
            Feature::Logs => "logs-v1",
            Feature::Traces => "traces-v1",
            Feature::Metrics => "metrics-v1",
        }
    }

    /// Path appended to the collector endpoint.
    pub fn intake_path(&self) -> &'static str {
        match self {
            Feature::Logs => "/api/v2/logs",
            Feature::Traces => "/api/v2/spans",
            Feature::Metrics => "/api/v2/series",
        }
    }

    /// Payload framing used by this feature's intake.
    pub fn data_format(&self) -> DataFormat {
        match self {
            Feature::Logs | Feature::Metrics => DataFormat::json_array(),
            Feature::Traces => DataFormat::newline_delimited(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Feature::Logs | Feature::Metrics => "application/json",
            Feature::Traces => "text/plain;charset=UTF-8",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logs" | "log" => Ok(Feature::Logs),
            "traces" | "trace" | "spans" => Ok(Feature::Traces),
            "metrics" | "metric" => Ok(Feature::Metrics),
            _ => Err(format!("unknown feature: {}", s)),
        }
    }
}

/// Describes how records stored back to back in a batch file become one
/// upload payload: `prefix + record (separator record)* + suffix`.
///
/// The separator is written to disk by the writer, before every record but
/// the first one of a file. Prefix and suffix are added by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFormat {
    pub prefix: Vec<u8>,
    pub suffix: Vec<u8>,
    pub separator: Vec<u8>,
}

impl DataFormat {
    pub fn new(prefix: &[u8], suffix: &[u8], separator: &[u8]) -> Self {
        Self {
            prefix: prefix.to_vec(),
            suffix: suffix.to_vec(),
            separator: separator.to_vec(),
        }
    }

    /// `[r1,r2,r3]`
    pub fn json_array() -> Self {
        Self::new(b"[", b"]", b",")
    }

    /// `r1\nr2\nr3`
    pub fn newline_delimited() -> Self {
        Self::new(b"", b"", b"\n")
    }

    /// Wrap the raw contents of a batch file.
    pub fn frame(&self, contents: &[u8]) -> Vec<u8> {
        let mut payload =
            Vec::with_capacity(self.prefix.len() + contents.len() + self.suffix.len());
        payload.extend_from_slice(&self.prefix);
        payload.extend_from_slice(contents);
        payload.extend_from_slice(&self.suffix);
        payload
    }
}
