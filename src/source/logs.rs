//! Tailing of JSON log endpoints.
//!
//! Services expose their recent activity as a JSON list of records, either
//! bare or wrapped in `{"logs": [...]}`. Each fetch returns the whole recent
//! window, so the tailer keeps a timestamp cursor and only forwards records
//! it has not seen yet.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::Poller;
use crate::aggregator::Aggregator;
use crate::config::LogSourceConfig;
use crate::data::log::{classify_severity, dedup_key, structured_severity};
use crate::data::LogEntry;
use crate::error::ProbeError;

/// Access-log lines for the dashboard's own health checks.
const HEALTH_CHECK_NOISE: &[&str] = &["GET /health", "GET /healthz"];

/// One record from a log endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LogsResponse {
    Wrapped { logs: Vec<LogRecord> },
    Bare(Vec<LogRecord>),
}

impl LogRecord {
    /// Display text: message, else error, else status plus target.
    pub fn text(&self) -> String {
        let message = self.message.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let error = self.error.as_deref().map(str::trim).filter(|s| !s.is_empty());

        match (message, error) {
            (Some(m), Some(e)) if !m.contains(e) => format!("{m}: {e}"),
            (Some(m), _) => m.to_string(),
            (None, Some(e)) => e.to_string(),
            (None, None) => {
                let status = self.status.as_deref().unwrap_or("").trim();
                let target = self
                    .filename
                    .as_deref()
                    .or(self.url.as_deref())
                    .unwrap_or("")
                    .trim();
                format!("{status} {target}").trim().to_string()
            }
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(parse_timestamp)
    }
}

/// Parse an RFC 3339 string, a naive local timestamp, or epoch seconds/millis.
pub fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .and_then(|naive| Local.from_local_datetime(&naive).earliest())
                .map(|dt| dt.with_timezone(&Utc))
        }
        serde_json::Value::Number(n) => {
            let raw = n.as_f64()?;
            // Anything past ~2001-09 in milliseconds is larger than this
            let millis = if raw > 1e12 { raw } else { raw * 1000.0 };
            DateTime::from_timestamp_millis(millis as i64)
        }
        _ => None,
    }
}

/// Parse a log endpoint response body.
pub fn parse_logs_response(body: &[u8]) -> Result<Vec<LogRecord>, ProbeError> {
    let response: LogsResponse =
        serde_json::from_slice(body).map_err(|e| ProbeError::Malformed(e.to_string()))?;
    Ok(match response {
        LogsResponse::Wrapped { logs } => logs,
        LogsResponse::Bare(logs) => logs,
    })
}

/// Polls one log endpoint and forwards unseen records.
#[derive(Debug)]
pub struct LogTailer {
    client: Client,
    id: String,
    url: String,
    interval: Duration,
    timeout: Duration,
    /// Newest timestamp forwarded so far.
    cursor: Option<DateTime<Utc>>,
    /// Dedup keys already forwarded at exactly the cursor timestamp.
    at_cursor: HashSet<String>,
    /// Dedup keys of untimestamped records in the previous fetch.
    previous_untimed: HashSet<String>,
}

impl LogTailer {
    pub fn new(client: Client, source: &LogSourceConfig) -> Self {
        Self {
            client,
            id: source.id.clone(),
            url: source.url.clone(),
            interval: source.interval,
            timeout: source.timeout,
            cursor: None,
            at_cursor: HashSet::new(),
            previous_untimed: HashSet::new(),
        }
    }

    pub async fn fetch(&self) -> Result<Vec<LogRecord>, ProbeError> {
        let response = self.client.get(&self.url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_logs_response(&body)
    }

    /// Turn a fetched batch into new entries, oldest first, advancing the cursor.
    pub fn select_new(&mut self, records: Vec<LogRecord>) -> Vec<LogEntry> {
        let now = Utc::now();
        let mut fresh: Vec<(DateTime<Utc>, LogRecord, String)> = Vec::new();
        let mut timed_keys: Vec<(DateTime<Utc>, String)> = Vec::new();
        let mut untimed = HashSet::new();
        let mut newest: Option<DateTime<Utc>> = None;

        for record in records {
            let text = record.text();
            if text.is_empty() || HEALTH_CHECK_NOISE.iter().any(|n| text.contains(n)) {
                continue;
            }

            match record.parsed_timestamp() {
                Some(ts) => {
                    let key = dedup_key(&self.id, &text);
                    if let Some(cursor) = self.cursor {
                        if ts < cursor || (ts == cursor && self.at_cursor.contains(&key)) {
                            continue;
                        }
                    }
                    newest = newest.max(Some(ts));
                    timed_keys.push((ts, key));
                    fresh.push((ts, record, text));
                }
                None => {
                    let key = dedup_key(&self.id, &text);
                    let seen = self.previous_untimed.contains(&key);
                    untimed.insert(key);
                    if !seen {
                        fresh.push((now, record, text));
                    }
                }
            }
        }

        self.previous_untimed = untimed;
        fresh.sort_by_key(|(ts, _, _)| *ts);

        // Fresh records are never older than the cursor
        if let Some(newest) = newest {
            if self.cursor != Some(newest) {
                self.cursor = Some(newest);
                self.at_cursor.clear();
            }
            self.at_cursor.extend(
                timed_keys
                    .into_iter()
                    .filter(|(ts, _)| *ts == newest)
                    .map(|(_, key)| key),
            );
        }

        fresh
            .into_iter()
            .map(|(ts, record, text)| {
                let hint = structured_severity(record.success, record.status.as_deref());
                let severity = classify_severity(&text, hint);
                LogEntry::new(&self.id, ts, text, severity)
            })
            .collect()
    }
}

#[async_trait]
impl Poller for LogTailer {
    fn name(&self) -> &str {
        &self.id
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&mut self, aggregator: &Aggregator) {
        match self.fetch().await {
            Ok(records) => {
                let entries = self.select_new(records);
                debug!(source = %self.id, new = entries.len(), "Fetched logs");
                aggregator.apply_logs(&self.id, entries);
            }
            Err(e) => {
                warn!(source = %self.id, error = %e, "Log fetch failed");
                aggregator.apply_log_failure(&self.id, &e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorPolicy;
    use crate::data::{ErrorCategory, Severity};
    use crate::source::test_support::{serve, serve_bodies};

    fn config(url: &str) -> LogSourceConfig {
        LogSourceConfig {
            id: "instagram".to_string(),
            url: url.to_string(),
            service: None,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(2),
        }
    }

    fn tailer() -> LogTailer {
        LogTailer::new(Client::new(), &config("http://localhost:6666/logs"))
    }

    fn record(ts: &str, message: &str) -> LogRecord {
        LogRecord {
            timestamp: Some(serde_json::Value::String(ts.to_string())),
            message: Some(message.to_string()),
            ..LogRecord::default()
        }
    }

    #[test]
    fn wrapped_and_bare_responses() {
        let wrapped = br#"{"logs":[{"timestamp":"2025-01-01T10:00:00Z","status":"completed","url":"https://instagram.com/p/x"}],"total":1}"#;
        let bare = br#"[{"message":"hello"}]"#;
        assert_eq!(parse_logs_response(wrapped).unwrap().len(), 1);
        assert_eq!(parse_logs_response(bare).unwrap()[0].text(), "hello");
        assert!(parse_logs_response(b"{\"detail\":\"nope\"}").is_err());
    }

    #[test]
    fn text_fallbacks() {
        let r = LogRecord {
            status: Some("completed".into()),
            filename: Some("clip.mp4".into()),
            ..LogRecord::default()
        };
        assert_eq!(r.text(), "completed clip.mp4");

        let r = LogRecord {
            message: Some("Download failed".into()),
            error: Some("429 Too Many Requests".into()),
            ..LogRecord::default()
        };
        assert_eq!(r.text(), "Download failed: 429 Too Many Requests");
    }

    #[test]
    fn timestamps() {
        let utc = parse_timestamp(&serde_json::json!("2025-01-01T10:00:00Z")).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-01-01T10:00:00+00:00");
        let secs = parse_timestamp(&serde_json::json!(1_735_725_600)).unwrap();
        let millis = parse_timestamp(&serde_json::json!(1_735_725_600_000u64)).unwrap();
        assert_eq!(secs, millis);
        assert!(parse_timestamp(&serde_json::json!("2025-01-01 10:00:00.123")).is_some());
        assert!(parse_timestamp(&serde_json::json!("yesterday")).is_none());
    }

    #[test]
    fn cursor_skips_seen_records() {
        let mut t = tailer();
        let first = t.select_new(vec![
            record("2025-01-01T10:00:02Z", "second"),
            record("2025-01-01T10:00:01Z", "first"),
        ]);
        let texts: Vec<_> = first.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        let second = t.select_new(vec![
            record("2025-01-01T10:00:03Z", "third"),
            record("2025-01-01T10:00:02Z", "second"),
            record("2025-01-01T10:00:01Z", "first"),
        ]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text, "third");
    }

    #[test]
    fn late_record_at_cursor_timestamp_is_kept() {
        let mut t = tailer();
        let first = t.select_new(vec![record("2025-01-01T10:00:00Z", "download A done")]);
        assert_eq!(first.len(), 1);

        let second = t.select_new(vec![
            record("2025-01-01T10:00:00Z", "download B failed: 429"),
            record("2025-01-01T10:00:00Z", "download A done"),
        ]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text, "download B failed: 429");
        assert_eq!(second[0].timestamp, first[0].timestamp);

        let third = t.select_new(vec![
            record("2025-01-01T10:00:00Z", "download B failed: 429"),
            record("2025-01-01T10:00:00Z", "download A done"),
        ]);
        assert!(third.is_empty());
    }

    #[test]
    fn untimed_records_seen_last_fetch_are_skipped() {
        let mut t = tailer();
        let plain = LogRecord {
            message: Some("worker idle".into()),
            ..LogRecord::default()
        };
        assert_eq!(t.select_new(vec![plain.clone()]).len(), 1);
        assert!(t.select_new(vec![plain.clone()]).is_empty());
        assert!(t.select_new(Vec::new()).is_empty());
        assert_eq!(t.select_new(vec![plain]).len(), 1);
    }

    #[test]
    fn health_check_noise_is_dropped() {
        let mut t = tailer();
        let entries = t.select_new(vec![record(
            "2025-01-01T10:00:00Z",
            "127.0.0.1 - GET /healthz 200",
        )]);
        assert!(entries.is_empty());
    }

    #[test]
    fn structured_fields_set_severity() {
        let mut t = tailer();
        let r = LogRecord {
            timestamp: Some(serde_json::json!("2025-01-01T10:00:00Z")),
            status: Some("failed".into()),
            url: Some("https://instagram.com/p/x".into()),
            success: Some(false),
            ..LogRecord::default()
        };
        let entries = t.select_new(vec![r]);
        assert_eq!(entries[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn poll_feeds_aggregator_and_dedups() {
        let body = r#"{"logs":[
            {"timestamp":"2025-01-01T10:00:02Z","message":"Download failed","error":"login required","success":false},
            {"timestamp":"2025-01-01T10:00:01Z","message":"Download failed","error":"login required","success":false}
        ]}"#;
        let base = serve_bodies(200, vec![body.to_string()]).await;
        let cfg = config(&format!("{base}/logs"));
        let aggregator = Aggregator::new(
            Vec::new(),
            vec![("instagram".to_string(), None)],
            AggregatorPolicy::default(),
        );

        let mut tailer = LogTailer::new(Client::new(), &cfg);
        tailer.poll(&aggregator).await;
        tailer.poll(&aggregator).await;

        let snap = aggregator.snapshot();
        let window = &snap.logs["instagram"].window;
        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().repeats, 2);
        let event = snap
            .errors
            .find_active("instagram", ErrorCategory::AuthFailure)
            .unwrap();
        assert_eq!(event.occurrences, 2);
    }

    #[tokio::test]
    async fn same_second_line_in_later_fetch_raises_event() {
        let first = r#"[{"timestamp":"2025-01-01T10:00:00Z","message":"download A done","success":true}]"#;
        let second = r#"[
            {"timestamp":"2025-01-01T10:00:00Z","message":"download B failed: 429","success":false},
            {"timestamp":"2025-01-01T10:00:00Z","message":"download A done","success":true}
        ]"#;
        let base = serve_bodies(200, vec![first.to_string(), second.to_string()]).await;
        let cfg = config(&format!("{base}/logs"));
        let aggregator = Aggregator::new(
            Vec::new(),
            vec![("instagram".to_string(), None)],
            AggregatorPolicy::default(),
        );

        let mut tailer = LogTailer::new(Client::new(), &cfg);
        tailer.poll(&aggregator).await;
        tailer.poll(&aggregator).await;

        let snap = aggregator.snapshot();
        assert_eq!(snap.logs["instagram"].window.len(), 2);
        assert!(snap
            .errors
            .find_active("instagram", ErrorCategory::RateLimit)
            .is_some());
    }

    #[tokio::test]
    async fn fetch_failure_is_recorded() {
        let base = serve(500, "oops").await;
        let cfg = config(&base);
        let aggregator = Aggregator::new(
            Vec::new(),
            vec![("instagram".to_string(), None)],
            AggregatorPolicy::default(),
        );
        LogTailer::new(Client::new(), &cfg).poll(&aggregator).await;
        assert_eq!(
            aggregator.snapshot().logs["instagram"].last_error.as_deref(),
            Some("HTTP 500")
        );
    }
}
