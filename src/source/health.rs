//! Health checks against service endpoints.
//!
//! ## Payload mapping
//!
//! A JSON health payload must be an object carrying `status` or `ok`:
//!
//! - `status` in {ok, healthy, up, pass, success} or `ok: true` is healthy;
//!   any other status (or `ok: false`) is a reported issue
//! - `authentication.cookies_exist: false` means cookies are missing,
//!   `authentication.cookies_valid: false` that they are invalid
//! - `authentication.authenticated: false` means upstream auth was rejected
//!
//! Anything else is a malformed payload and counts as a failed poll.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::Poller;
use crate::aggregator::Aggregator;
use crate::config::{CheckKind, ServiceConfig};
use crate::data::{HealthIssue, HealthProbe, HealthReport};
use crate::error::ProbeError;

const HEALTHY_STATUSES: &[&str] = &["ok", "healthy", "up", "pass", "success"];

#[derive(Debug, Deserialize)]
struct HealthPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    authentication: Option<AuthPayload>,
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    #[serde(default)]
    cookies_valid: Option<bool>,
    #[serde(default)]
    cookies_exist: Option<bool>,
    #[serde(default)]
    authenticated: Option<bool>,
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Normalize a JSON health payload.
///
/// Returns the report plus any free-form error text the payload carried
/// (for alert classification).
pub fn parse_health_payload(body: &[u8]) -> Result<(HealthReport, Option<String>), ProbeError> {
    let payload: HealthPayload =
        serde_json::from_slice(body).map_err(|e| ProbeError::Malformed(e.to_string()))?;

    if payload.status.is_none() && payload.ok.is_none() {
        return Err(ProbeError::Malformed(
            "health payload has neither status nor ok".to_string(),
        ));
    }

    let message = non_empty(payload.message);
    let error = non_empty(payload.error);
    let mut issues = Vec::new();

    match payload.status.as_deref().map(str::trim) {
        Some(status) if !HEALTHY_STATUSES.contains(&status.to_ascii_lowercase().as_str()) => {
            issues.push(HealthIssue::Reported(status.to_string()));
        }
        _ => {
            if payload.ok == Some(false) {
                let text = error
                    .clone()
                    .or_else(|| message.clone())
                    .unwrap_or_else(|| "not ok".to_string());
                issues.push(HealthIssue::Reported(text));
            }
        }
    }

    if let Some(auth) = payload.authentication {
        if auth.cookies_exist == Some(false) {
            issues.push(HealthIssue::CookiesMissing);
        } else if auth.cookies_valid == Some(false) {
            issues.push(HealthIssue::CookiesInvalid);
        }
        if auth.authenticated == Some(false) {
            issues.push(HealthIssue::AuthRejected);
        }
    }

    // A healthy payload's `message` is usually just a greeting
    let detail = match error {
        Some(error) => Some(error),
        None if !issues.is_empty() => message,
        None => None,
    };

    Ok((HealthReport::from_issues(issues), detail))
}

/// Polls one service's health endpoint.
#[derive(Debug)]
pub struct HealthProber {
    client: Client,
    name: String,
    url: String,
    check: CheckKind,
    interval: Duration,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(client: Client, service: &ServiceConfig) -> Self {
        Self {
            client,
            name: service.name.clone(),
            url: service.health_url(),
            check: service.check,
            interval: service.interval,
            timeout: service.timeout,
        }
    }

    /// Perform one health request.
    pub async fn probe(&self) -> Result<HealthProbe, ProbeError> {
        let started = Instant::now();
        let response = self.client.get(&self.url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        match self.check {
            CheckKind::Http => Ok(HealthProbe {
                report: HealthReport::Up,
                latency: started.elapsed(),
                message: None,
            }),
            CheckKind::Json => {
                let body = response.bytes().await?;
                let latency = started.elapsed();
                let (report, message) = parse_health_payload(&body)?;
                Ok(HealthProbe {
                    report,
                    latency,
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl Poller for HealthProber {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&mut self, aggregator: &Aggregator) {
        let outcome = self.probe().await;
        debug!(service = %self.name, ok = outcome.is_ok(), "Health check");
        aggregator.apply_health(&self.name, outcome);
    }
}
