//! Per-service latency history for sparklines.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

/// Maximum number of samples kept per service.
const MAX_HISTORY_SIZE: usize = 60;

/// Tracks recent health-check latencies so the UI can draw trends.
///
/// Failed checks are recorded as gaps (`None`) so an outage is visible
/// in the sparkline rather than silently skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencyHistory {
    samples: HashMap<String, VecDeque<Option<u64>>>,
}

impl LatencyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one check result for a service.
    pub fn record(&mut self, service: &str, latency: Option<Duration>) {
        let series = self.samples.entry(service.to_string()).or_default();
        series.push_back(latency.map(|d| d.as_millis() as u64));
        if series.len() > MAX_HISTORY_SIZE {
            series.pop_front();
        }
    }

    /// Get sparkline data (normalized to 0-7 for 8 bar levels).
    ///
    /// Gaps render as level 0. Returns an empty Vec if there's not
    /// enough history.
    pub fn sparkline(&self, service: &str) -> Vec<u8> {
        let Some(values) = self.samples.get(service) else {
            return Vec::new();
        };

        if values.len() < 2 {
            return Vec::new();
        }

        let max = values.iter().flatten().copied().max().unwrap_or(1).max(1);
        let min = values.iter().flatten().copied().min().unwrap_or(0);
        let range = (max - min).max(1) as f64;

        values
            .iter()
            .map(|v| match v {
                Some(v) => (1.0 + (v - min) as f64 / range * 6.0).round().min(7.0) as u8,
                None => 0,
            })
            .collect()
    }

    /// Mean of the successful samples, in milliseconds.
    pub fn average_ms(&self, service: &str) -> Option<f64> {
        let values = self.samples.get(service)?;
        let ok: Vec<u64> = values.iter().flatten().copied().collect();
        if ok.is_empty() {
            return None;
        }
        Some(ok.iter().sum::<u64>() as f64 / ok.len() as f64)
    }
}
