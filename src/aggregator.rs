//! The single owned store of dashboard state.
//!
//! Pollers write through narrow `apply_*` methods; the renderer reads a
//! cloned [`DashboardSnapshot`] once per frame. All writes are short
//! critical sections on one [`parking_lot::RwLock`], so a slow poller never
//! holds the lock while waiting on I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::data::{
    categorize, ErrorCategory, ErrorLedger, HealthProbe, HealthStatus, HighWater, HiveStats,
    HiveStatsState, LatencyHistory, LogEntry, LogWindow, NetworkSample, ResolutionPolicy, ResourceSample, RunState, ServiceTarget,
    SpeedTestResult, Throughput,
};
use crate::error::ProbeError;

/// Source id used for connectivity alerts.
pub const INTERNET_SOURCE: &str = "internet";

/// Thresholds the aggregator applies to incoming outcomes.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorPolicy {
    pub failure_threshold: u32,
    pub high_water: HighWater,
    pub resolution: ResolutionPolicy,
    pub log_window: usize,
}

impl Default for AggregatorPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            high_water: HighWater::default(),
            resolution: ResolutionPolicy::default(),
            log_window: 50,
        }
    }
}

/// Fetch status and recent entries of one log source.
#[derive(Debug, Clone, Serialize)]
pub struct LogSourceState {
    pub window: LogWindow,
    /// Service this source's alerts are attributed to.
    pub service: Option<String>,
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Consistent view of all monitored state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub services: Vec<ServiceTarget>,
    pub resources: BTreeMap<String, ResourceSample>,
    pub logs: BTreeMap<String, LogSourceState>,
    pub errors: ErrorLedger,
    pub network: NetworkSample,
    pub hive_stats: HiveStatsState,
    pub latency_history: LatencyHistory,
    pub terminal: (u16, u16),
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardSnapshot {
    pub fn service(&self, name: &str) -> Option<&ServiceTarget> {
        self.services.iter().find(|s| s.name == name)
    }

    /// All log entries across sources, newest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<&LogEntry> {
        let mut entries: Vec<&LogEntry> =
            self.logs.values().flat_map(|s| s.window.iter()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        entries
    }

    pub fn count_by_status(&self, status: HealthStatus) -> usize {
        self.services.iter().filter(|s| s.status == status).count()
    }
}

/// Owner of the [`DashboardSnapshot`].
#[derive(Debug)]
pub struct Aggregator {
    state: RwLock<DashboardSnapshot>,
    policy: AggregatorPolicy,
}

impl Aggregator {
    /// Create an aggregator for a fixed set of services and log sources.
    ///
    /// `log_sources` pairs each source id with the service it is linked to.
    pub fn new(
        services: Vec<ServiceTarget>,
        log_sources: Vec<(String, Option<String>)>,
        policy: AggregatorPolicy,
    ) -> Self {
        let logs = log_sources
            .into_iter()
            .map(|(id, service)| {
                (
                    id,
                    LogSourceState {
                        window: LogWindow::new(policy.log_window),
                        service,
                        last_fetch: None,
                        last_error: None,
                    },
                )
            })
            .collect();

        let state = DashboardSnapshot {
            services,
            logs,
            errors: ErrorLedger::new(policy.resolution),
            ..DashboardSnapshot::default()
        };

        Self {
            state: RwLock::new(state),
            policy,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let services = settings.services.iter().map(|s| s.target()).collect();
        let log_sources = settings
            .logs
            .iter()
            .map(|l| (l.id.clone(), l.service.clone()))
            .collect();
        Self::new(services, log_sources, settings.policy())
    }

    pub fn policy(&self) -> &AggregatorPolicy {
        &self.policy
    }

    /// Clone the current state for reading.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state.read().clone()
    }

    /// Apply the outcome of one health check.
    pub fn apply_health(&self, name: &str, outcome: Result<HealthProbe, ProbeError>) {
        let now = Utc::now();
        let mut state = self.state.write();
        let DashboardSnapshot {
            services,
            errors,
            latency_history,
            ..
        } = &mut *state;

        let Some(service) = services.iter_mut().find(|s| s.name == name) else {
            warn!(service = name, "Health outcome for unknown service");
            return;
        };
        let previous = service.status;

        match outcome {
            Ok(probe) => {
                service.record_success(&probe.report, probe.latency, now);
                latency_history.record(name, Some(probe.latency));

                // One occurrence per category per check
                let mut raised: Vec<ErrorCategory> = Vec::new();
                for issue in probe.report.issues() {
                    let detail = issue.describe();
                    let categories = match issue.category() {
                        Some(category) => vec![category],
                        None => categorize(&detail),
                    };
                    for category in categories {
                        if !raised.contains(&category) {
                            errors.record(name, category, &detail, now);
                            raised.push(category);
                        }
                    }
                }
                if let Some(message) = probe.message.as_deref() {
                    for category in categorize(message) {
                        if !raised.contains(&category) {
                            errors.record(name, category, message, now);
                            raised.push(category);
                        }
                    }
                }

                if service.status == HealthStatus::Up && probe.message.is_none() {
                    let resolved = errors.healthy(name, now);
                    if resolved > 0 {
                        info!(service = name, resolved, "Resolved events after healthy checks");
                    }
                } else if raised.is_empty() {
                    errors.unhealthy(name);
                }
            }
            Err(err) => {
                let text = err.to_string();
                service.record_failure(&text, self.policy.failure_threshold, now);
                latency_history.record(name, None);
                match err.category() {
                    Some(category) => {
                        errors.record(name, category, &text, now);
                    }
                    None => errors.unhealthy(name),
                }
                debug!(
                    service = name,
                    failures = service.consecutive_failures,
                    error = %text,
                    "Health check failed"
                );
            }
        }

        if service.status != previous {
            info!(
                service = name,
                from = previous.label(),
                to = service.status.label(),
                "Service status changed"
            );
        }

        errors.sweep(now);
        state.updated_at = Some(now);
    }

    /// Replace the latest resource samples.
    pub fn apply_resources(&self, samples: Vec<ResourceSample>) {
        let now = Utc::now();
        let mut state = self.state.write();

        for sample in samples {
            let container = sample.container.clone();
            if let Some(detail) = sample.exceeds(&self.policy.high_water) {
                state.errors.record(
                    &container,
                    ErrorCategory::ResourceInsufficiency,
                    &detail,
                    now,
                );
            } else if sample.run_state == RunState::Running {
                state.errors.healthy(&container, now);
            } else {
                state.errors.unhealthy(&container);
            }
            state.resources.insert(container, sample);
        }

        state.errors.sweep(now);
        state.updated_at = Some(now);
    }

    /// Apply the outcome of one connectivity check.
    pub fn apply_connectivity(&self, outcome: Result<std::time::Duration, ProbeError>) {
        let now = Utc::now();
        let mut state = self.state.write();

        match outcome {
            Ok(latency) => {
                state.network.record_online(latency, now);
                state.errors.healthy(INTERNET_SOURCE, now);
            }
            Err(err) => {
                let text = err.to_string();
                state.network.record_offline(&text, now);
                match err.category() {
                    Some(category) => {
                        state.errors.record(INTERNET_SOURCE, category, &text, now);
                    }
                    None => state.errors.unhealthy(INTERNET_SOURCE),
                }
            }
        }

        state.errors.sweep(now);
        state.updated_at = Some(now);
    }

    /// Mark a throughput test as in flight.
    pub fn begin_throughput(&self) {
        let now = Utc::now();
        let mut state = self.state.write();
        state.network.begin_throughput(now);
        state.updated_at = Some(now);
    }

    /// Apply the outcome of a throughput test.
    pub fn apply_throughput(&self, outcome: Result<SpeedTestResult, ProbeError>) {
        let now = Utc::now();
        let mut state = self.state.write();
        state.network.throughput = match outcome {
            Ok(result) => Throughput::Measured { result, at: now },
            Err(err) => Throughput::Unknown {
                reason: err.to_string(),
            },
        };
        state.updated_at = Some(now);
    }

    /// Apply the outcome of a community stats fetch.
    pub fn apply_hive_stats(&self, outcome: Result<HiveStats, ProbeError>) {
        let now = Utc::now();
        let mut state = self.state.write();
        match outcome {
            Ok(stats) => state.hive_stats.record(stats, now),
            Err(err) => state.hive_stats.record_failure(&err.to_string()),
        }
        state.updated_at = Some(now);
    }

    /// Append newly fetched entries from one log source, oldest first.
    pub fn apply_logs(&self, source: &str, entries: Vec<LogEntry>) {
        let now = Utc::now();
        let mut state = self.state.write();
        let DashboardSnapshot { logs, errors, .. } = &mut *state;

        let Some(log) = logs.get_mut(source) else {
            warn!(source, "Log entries for unknown source");
            return;
        };
        let attribute_to = log.service.clone().unwrap_or_else(|| source.to_string());

        let mut matched = false;
        for entry in entries {
            if entry.severity.is_problem() {
                for category in categorize(&entry.text) {
                    // Events take arrival time; the entry keeps the line's own timestamp
                    errors.record(&attribute_to, category, &entry.text, now);
                    matched = true;
                }
            }
            log.window.push(entry);
        }

        log.last_fetch = Some(now);
        log.last_error = None;

        // Linked sources leave healthy signals to the service's own prober
        if log.service.is_none() && !matched {
            errors.healthy(source, now);
        }

        errors.sweep(now);
        state.updated_at = Some(now);
    }

    /// Record a failed fetch from a log source.
    pub fn apply_log_failure(&self, source: &str, err: &ProbeError) {
        let now = Utc::now();
        let mut state = self.state.write();
        if let Some(log) = state.logs.get_mut(source) {
            log.last_error = Some(err.to_string());
        }
        state.errors.sweep(now);
        state.updated_at = Some(now);
    }

    /// Record the terminal size the renderer is drawing at.
    pub fn set_terminal_size(&self, width: u16, height: u16) {
        self.state.write().terminal = (width, height);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::data::{HealthIssue, HealthReport, Severity};

    fn aggregator() -> Aggregator {
        let services = vec![ServiceTarget::new(
            "instagram-downloader",
            "http://localhost:6666",
            "http://localhost:6666/health",
            "localhost",
            Duration::from_secs(10),
            Duration::from_secs(5),
        )];
        let logs = vec![
            ("instagram".to_string(), Some("instagram-downloader".to_string())),
            ("transcoder".to_string(), None),
        ];
        Aggregator::new(services, logs, AggregatorPolicy::default())
    }

    fn up() -> Result<HealthProbe, ProbeError> {
        Ok(HealthProbe {
            report: HealthReport::Up,
            latency: Duration::from_millis(20),
            message: None,
        })
    }

    #[test]
    fn cookie_issue_degrades_and_raises_event() {
        let agg = aggregator();
        agg.apply_health(
            "instagram-downloader",
            Ok(HealthProbe {
                report: HealthReport::Degraded(vec![
                    HealthIssue::Reported("error".into()),
                    HealthIssue::CookiesInvalid,
                ]),
                latency: Duration::from_millis(50),
                message: None,
            }),
        );

        let snap = agg.snapshot();
        let svc = snap.service("instagram-downloader").unwrap();
        assert_eq!(svc.status, HealthStatus::Degraded);
        assert!(snap
            .errors
            .find_active("instagram-downloader", ErrorCategory::CookieExpiry)
            .is_some());
    }

    #[test]
    fn reported_status_wording_is_categorized() {
        let agg = aggregator();
        let (report, message) = crate::source::health::parse_health_payload(
            br#"{"status":"rate_limited","message":"rate limited by upstream"}"#,
        )
        .unwrap();
        agg.apply_health(
            "instagram-downloader",
            Ok(HealthProbe {
                report,
                latency: Duration::from_millis(40),
                message,
            }),
        );

        let snap = agg.snapshot();
        assert_eq!(
            snap.service("instagram-downloader").unwrap().status,
            HealthStatus::Degraded
        );
        let event = snap
            .errors
            .find_active("instagram-downloader", ErrorCategory::RateLimit)
            .unwrap();
        assert_eq!(event.occurrences, 1);
    }

    #[test]
    fn down_only_after_threshold() {
        let agg = aggregator();
        agg.apply_health("instagram-downloader", up());
        for _ in 0..2 {
            agg.apply_health("instagram-downloader", Err(ProbeError::Timeout));
            assert_eq!(
                agg.snapshot().service("instagram-downloader").unwrap().status,
                HealthStatus::Up
            );
        }
        agg.apply_health("instagram-downloader", Err(ProbeError::Timeout));

        let snap = agg.snapshot();
        assert_eq!(snap.service("instagram-downloader").unwrap().status, HealthStatus::Down);
        let event = snap
            .errors
            .find_active("instagram-downloader", ErrorCategory::Timeout)
            .unwrap();
        assert_eq!(event.occurrences, 3);
    }

    #[test]
    fn healthy_checks_resolve_events() {
        let agg = aggregator();
        agg.apply_health("instagram-downloader", Err(ProbeError::Status(429)));
        assert_eq!(agg.snapshot().errors.active_count(), 1);

        for _ in 0..3 {
            agg.apply_health("instagram-downloader", up());
        }
        let snap = agg.snapshot();
        assert_eq!(snap.errors.active_count(), 0);
        assert_eq!(snap.errors.resolved().count(), 1);
    }

    #[test]
    fn linked_log_source_attributes_to_service() {
        let agg = aggregator();
        let entry = LogEntry::new(
            "instagram",
            Utc::now(),
            "Download failed: 429 Too Many Requests",
            Severity::Error,
        );
        agg.apply_logs("instagram", vec![entry.clone(), entry]);

        let snap = agg.snapshot();
        let event = snap
            .errors
            .find_active("instagram-downloader", ErrorCategory::RateLimit)
            .unwrap();
        assert_eq!(event.occurrences, 2);
        let window = &snap.logs["instagram"].window;
        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().repeats, 2);
    }

    #[test]
    fn info_lines_are_not_categorized() {
        let agg = aggregator();
        let entry = LogEntry::new("transcoder", Utc::now(), "retry timeout set to 30s", Severity::Info);
        agg.apply_logs("transcoder", vec![entry]);
        assert_eq!(agg.snapshot().errors.active_count(), 0);
    }

    #[test]
    fn resources_over_mark_raise_event() {
        let agg = aggregator();
        let mut sample = ResourceSample::bare("video-worker", RunState::Running, Utc::now());
        sample.cpu_percent = Some(97.0);
        agg.apply_resources(vec![sample]);

        let snap = agg.snapshot();
        assert!(snap
            .errors
            .find_active("video-worker", ErrorCategory::ResourceInsufficiency)
            .is_some());
        assert_eq!(snap.resources["video-worker"].run_state, RunState::Running);
    }

    #[test]
    fn connectivity_and_throughput() {
        let agg = aggregator();
        agg.apply_connectivity(Ok(Duration::from_millis(25)));
        agg.begin_throughput();
        assert!(matches!(agg.snapshot().network.throughput, Throughput::Running { .. }));

        agg.apply_throughput(Err(ProbeError::Unavailable("speedtest not installed".into())));
        let snap = agg.snapshot();
        assert!(matches!(snap.network.throughput, Throughput::Unknown { .. }));
        assert_eq!(snap.network.latency, Some(Duration::from_millis(25)));
    }

    #[test]
    fn log_failure_is_recorded() {
        let agg = aggregator();
        agg.apply_log_failure("transcoder", &ProbeError::Status(502));
        let snap = agg.snapshot();
        assert_eq!(snap.logs["transcoder"].last_error.as_deref(), Some("HTTP 502"));
    }
}
