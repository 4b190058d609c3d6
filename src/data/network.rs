//! Internet connectivity and throughput state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl Connectivity {
    pub fn label(&self) -> &'static str {
        match self {
            Connectivity::Unknown => "unknown",
            Connectivity::Online => "online",
            Connectivity::Offline => "offline",
        }
    }
}

/// Parsed output of an external speed test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedTestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
}

/// State of the slow throughput measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Throughput {
    /// No test has run yet.
    #[default]
    Pending,
    Running {
        since: DateTime<Utc>,
        /// Result of the previous run, kept on screen while a new one runs.
        previous: Option<SpeedTestResult>,
    },
    Measured {
        result: SpeedTestResult,
        at: DateTime<Utc>,
    },
    Unknown {
        reason: String,
    },
}

impl Throughput {
    /// The most recent measurement still worth showing.
    pub fn last_result(&self) -> Option<&SpeedTestResult> {
        match self {
            Throughput::Measured { result, .. } => Some(result),
            Throughput::Running { previous, .. } => previous.as_ref(),
            _ => None,
        }
    }
}

/// Latest connectivity and throughput readings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkSample {
    pub connectivity: Connectivity,
    pub latency: Option<Duration>,
    pub checked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub throughput: Throughput,
}

impl NetworkSample {
    pub fn record_online(&mut self, latency: Duration, at: DateTime<Utc>) {
        self.connectivity = Connectivity::Online;
        self.latency = Some(latency);
        self.checked_at = Some(at);
        self.last_error = None;
    }

    pub fn record_offline(&mut self, error: &str, at: DateTime<Utc>) {
        self.connectivity = Connectivity::Offline;
        self.latency = None;
        self.checked_at = Some(at);
        self.last_error = Some(error.to_string());
    }

    pub fn begin_throughput(&mut self, at: DateTime<Utc>) {
        let previous = self.throughput.last_result().copied();
        self.throughput = Throughput::Running { since: at, previous };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_keeps_previous_result() {
        let mut n = NetworkSample::default();
        let result = SpeedTestResult {
            download_mbps: 250.0,
            upload_mbps: 40.0,
            ping_ms: 12.0,
        };
        n.throughput = Throughput::Measured { result, at: Utc::now() };
        n.begin_throughput(Utc::now());
        assert!(matches!(n.throughput, Throughput::Running { .. }));
        assert_eq!(n.throughput.last_result(), Some(&result));
    }

    #[test]
    fn offline_clears_latency() {
        let mut n = NetworkSample::default();
        n.record_online(Duration::from_millis(30), Utc::now());
        n.record_offline("connection refused", Utc::now());
        assert_eq!(n.connectivity, Connectivity::Offline);
        assert!(n.latency.is_none());
        assert_eq!(n.last_error.as_deref(), Some("connection refused"));
    }
}
