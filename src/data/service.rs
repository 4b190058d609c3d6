//! Monitored services and their health state.
//!
//! A [`ServiceTarget`] is created once from configuration and then only
//! changes through [`ServiceTarget::record_success`] and
//! [`ServiceTarget::record_failure`], which the aggregator calls with the
//! outcome of that service's own prober.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alert::ErrorCategory;

/// Health status of a monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Never successfully polled and not yet past the failure threshold.
    #[default]
    Unknown,
    Up,
    /// Reachable, but the payload reports a non-fatal problem.
    Degraded,
    Down,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "??",
            HealthStatus::Up => "UP",
            HealthStatus::Degraded => "DEGR",
            HealthStatus::Down => "DOWN",
        }
    }

    /// Returns the display label.
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Up => "up",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }
}

/// A non-fatal problem reported inside an otherwise successful health payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum HealthIssue {
    /// Cookies exist but the service reports them as invalid.
    CookiesInvalid,
    /// The service has no cookies at all.
    CookiesMissing,
    /// The service reports that it is not authenticated upstream.
    AuthRejected,
    /// A status other than "ok", with the service's own wording.
    Reported(String),
}

impl HealthIssue {
    /// The alert category this issue raises, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            HealthIssue::CookiesInvalid | HealthIssue::CookiesMissing => {
                Some(ErrorCategory::CookieExpiry)
            }
            HealthIssue::AuthRejected => Some(ErrorCategory::AuthFailure),
            HealthIssue::Reported(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            HealthIssue::CookiesInvalid => "cookies invalid".to_string(),
            HealthIssue::CookiesMissing => "cookies missing".to_string(),
            HealthIssue::AuthRejected => "not authenticated".to_string(),
            HealthIssue::Reported(text) => text.clone(),
        }
    }
}

/// Normalized result of a successful health request.
///
/// Untyped JSON never crosses the prober boundary; everything downstream
/// matches on this instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "issues", rename_all = "snake_case")]
pub enum HealthReport {
    Up,
    Degraded(Vec<HealthIssue>),
}

impl HealthReport {
    /// Build a report from a list of issues (empty means healthy).
    pub fn from_issues(issues: Vec<HealthIssue>) -> Self {
        if issues.is_empty() {
            HealthReport::Up
        } else {
            HealthReport::Degraded(issues)
        }
    }

    pub fn status(&self) -> HealthStatus {
        match self {
            HealthReport::Up => HealthStatus::Up,
            HealthReport::Degraded(_) => HealthStatus::Degraded,
        }
    }

    pub fn issues(&self) -> &[HealthIssue] {
        match self {
            HealthReport::Up => &[],
            HealthReport::Degraded(issues) => issues,
        }
    }
}

/// What a health prober hands to the aggregator after a successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthProbe {
    pub report: HealthReport,
    pub latency: Duration,
    /// Free-form `error` / `message` text from the payload, if any.
    pub message: Option<String>,
}

/// A monitored service endpoint and its last-known health.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceTarget {
    pub name: String,
    pub base_url: String,
    pub health_url: String,
    /// Expected container name in the local runtime, if any.
    pub container: Option<String>,
    /// Host label used to group services in the per-host panel.
    pub host: String,
    pub interval: Duration,
    pub timeout: Duration,

    pub status: HealthStatus,
    pub latency: Option<Duration>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub issues: Vec<HealthIssue>,
}

impl ServiceTarget {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        health_url: impl Into<String>,
        host: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            health_url: health_url.into(),
            container: None,
            host: host.into(),
            interval,
            timeout,
            status: HealthStatus::Unknown,
            latency: None,
            last_success: None,
            last_checked: None,
            consecutive_failures: 0,
            last_error: None,
            issues: Vec::new(),
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Apply a successful poll.
    pub fn record_success(&mut self, report: &HealthReport, latency: Duration, at: DateTime<Utc>) {
        self.status = report.status();
        self.issues = report.issues().to_vec();
        self.latency = Some(latency);
        self.last_success = Some(at);
        self.last_checked = Some(at);
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Apply a failed poll.
    ///
    /// The status only drops to [`HealthStatus::Down`] once `threshold`
    /// consecutive failures have been seen; until then it keeps its
    /// previous value so a single dropped request doesn't flap the display.
    pub fn record_failure(&mut self, error: &str, threshold: u32, at: DateTime<Utc>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());
        self.last_checked = Some(at);
        if self.consecutive_failures >= threshold.max(1) {
            self.status = HealthStatus::Down;
            self.latency = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ServiceTarget {
        ServiceTarget::new(
            "video-transcoder",
            "http://localhost:8081",
            "http://localhost:8081/healthz",
            "localhost",
            Duration::from_secs(10),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn single_failure_keeps_previous_status() {
        let mut t = target();
        t.record_success(&HealthReport::Up, Duration::from_millis(40), Utc::now());
        assert_eq!(t.status, HealthStatus::Up);

        t.record_failure("Request timed out", 3, Utc::now());
        assert_eq!(t.status, HealthStatus::Up);
        assert_eq!(t.consecutive_failures, 1);
        assert_eq!(t.last_error.as_deref(), Some("Request timed out"));
    }

    #[test]
    fn degraded_survives_single_failure() {
        let mut t = target();
        let report = HealthReport::Degraded(vec![HealthIssue::CookiesInvalid]);
        t.record_success(&report, Duration::from_millis(40), Utc::now());
        t.record_failure("connection refused", 3, Utc::now());
        assert_eq!(t.status, HealthStatus::Degraded);
        assert_eq!(t.consecutive_failures, 1);
    }

    #[test]
    fn threshold_failures_mark_down() {
        let mut t = target();
        t.record_success(&HealthReport::Up, Duration::from_millis(40), Utc::now());
        for _ in 0..2 {
            t.record_failure("timeout", 3, Utc::now());
            assert_eq!(t.status, HealthStatus::Up);
        }
        t.record_failure("timeout", 3, Utc::now());
        assert_eq!(t.status, HealthStatus::Down);
        assert_eq!(t.consecutive_failures, 3);
        assert!(t.latency.is_none());
    }

    #[test]
    fn success_resets_failure_count() {
        let mut t = target();
        for _ in 0..5 {
            t.record_failure("timeout", 3, Utc::now());
        }
        assert_eq!(t.status, HealthStatus::Down);

        t.record_success(&HealthReport::Up, Duration::from_millis(12), Utc::now());
        assert_eq!(t.status, HealthStatus::Up);
        assert_eq!(t.consecutive_failures, 0);
        assert!(t.last_error.is_none());
    }

    #[test]
    fn unknown_stays_unknown_below_threshold() {
        let mut t = target();
        t.record_failure("timeout", 3, Utc::now());
        assert_eq!(t.status, HealthStatus::Unknown);
    }

    #[test]
    fn issue_categories() {
        assert_eq!(HealthIssue::CookiesInvalid.category(), Some(ErrorCategory::CookieExpiry));
        assert_eq!(HealthIssue::CookiesMissing.category(), Some(ErrorCategory::CookieExpiry));
        assert_eq!(HealthIssue::AuthRejected.category(), Some(ErrorCategory::AuthFailure));
        assert_eq!(HealthIssue::Reported("error".into()).category(), None);
    }
}
