//! Hive community stats fetcher.
//!
//! The stats API has answered with the stats object bare, nested one level
//! inside another object, and as the first element of a list; the object
//! is recognized by its `total_subscribers` key wherever it sits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::Poller;
use crate::aggregator::Aggregator;
use crate::config::HiveStatsConfig;
use crate::data::HiveStats;
use crate::error::ProbeError;

const STATS_KEY: &str = "total_subscribers";

fn stats_object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object().filter(|o| o.contains_key(STATS_KEY))
}

fn find_stats(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => stats_object(value).or_else(|| map.values().find_map(stats_object)),
        Value::Array(items) => items.first().and_then(stats_object),
        _ => None,
    }
}

/// A number, or a string holding one.
fn number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn count(map: &Map<String, Value>, key: &str) -> Option<u64> {
    number(map, key).filter(|v| *v >= 0.0).map(|v| v as u64)
}

/// Parse a stats API response body.
pub fn parse_hive_stats(body: &[u8]) -> Result<HiveStats, ProbeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ProbeError::Malformed(e.to_string()))?;
    let stats = find_stats(&value)
        .ok_or_else(|| ProbeError::Malformed(format!("no {STATS_KEY} in response")))?;

    Ok(HiveStats {
        subscribers: count(stats, "total_subscribers"),
        posts: count(stats, "total_posts"),
        comments: count(stats, "total_comments"),
        active_authors: count(stats, "unique_post_authors_last_30_days"),
        active_commenters: count(stats, "unique_comment_authors_last_30_days"),
        payouts_hbd: number(stats, "total_payouts_hbd"),
    })
}

/// Polls the community stats endpoint.
#[derive(Debug)]
pub struct HiveStatsPoller {
    client: Client,
    url: String,
    interval: Duration,
    timeout: Duration,
}

impl HiveStatsPoller {
    pub fn new(client: Client, config: &HiveStatsConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            interval: config.interval,
            timeout: config.timeout,
        }
    }

    pub async fn fetch(&self) -> Result<HiveStats, ProbeError> {
        let response = self.client.get(&self.url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_hive_stats(&body)
    }
}

#[async_trait]
impl Poller for HiveStatsPoller {
    fn name(&self) -> &str {
        "hive-stats"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&mut self, aggregator: &Aggregator) {
        let outcome = self.fetch().await;
        match &outcome {
            Ok(stats) => debug!(subscribers = ?stats.subscribers, "Fetched community stats"),
            Err(e) => warn!(error = %e, "Community stats fetch failed"),
        }
        aggregator.apply_hive_stats(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorPolicy;
    use crate::source::test_support::{serve, serve_bodies};

    fn config(url: &str) -> HiveStatsConfig {
        HiveStatsConfig {
            enabled: true,
            url: url.to_string(),
            interval: Duration::from_secs(300),
            timeout: Duration::from_secs(2),
        }
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(Vec::new(), Vec::new(), AggregatorPolicy::default())
    }

    #[test]
    fn finds_stats_wherever_they_sit() {
        let bare = br#"{"total_subscribers":1200,"total_posts":"340","total_payouts_hbd":"1234.5"}"#;
        let stats = parse_hive_stats(bare).unwrap();
        assert_eq!(stats.subscribers, Some(1200));
        assert_eq!(stats.posts, Some(340));
        assert_eq!(stats.payouts_hbd, Some(1234.5));
        assert_eq!(stats.comments, None);

        let nested = br#"{"hive-173115":{"total_subscribers":7,"unique_post_authors_last_30_days":3}}"#;
        assert_eq!(parse_hive_stats(nested).unwrap().active_authors, Some(3));

        let listed = br#"[{"total_subscribers":9}]"#;
        assert_eq!(parse_hive_stats(listed).unwrap().subscribers, Some(9));
    }

    #[test]
    fn missing_stats_are_malformed() {
        assert!(matches!(
            parse_hive_stats(br#"{"error":"unknown community"}"#),
            Err(ProbeError::Malformed(_))
        ));
        assert!(parse_hive_stats(b"[]").is_err());
        assert!(parse_hive_stats(b"<html>").is_err());
    }

    #[tokio::test]
    async fn poll_records_stats_then_keeps_them_on_failure() {
        let ok = r#"{"total_subscribers":1200,"total_comments":5400}"#.to_string();
        let broken = r#"{"detail":"maintenance"}"#.to_string();
        let base = serve_bodies(200, vec![ok, broken]).await;
        let aggregator = aggregator();

        let mut poller = HiveStatsPoller::new(Client::new(), &config(&format!("{base}/communities")));
        poller.poll(&aggregator).await;
        let snap = aggregator.snapshot();
        assert_eq!(snap.hive_stats.stats.as_ref().unwrap().comments, Some(5400));
        assert!(snap.hive_stats.fetched_at.is_some());

        poller.poll(&aggregator).await;
        let snap = aggregator.snapshot();
        assert_eq!(snap.hive_stats.stats.as_ref().unwrap().subscribers, Some(1200));
        assert!(snap.hive_stats.last_error.is_some());
    }

    #[tokio::test]
    async fn http_error_is_kept_as_state() {
        let base = serve(503, "unavailable").await;
        let aggregator = aggregator();
        HiveStatsPoller::new(Client::new(), &config(&base))
            .poll(&aggregator)
            .await;

        let snap = aggregator.snapshot();
        assert!(snap.hive_stats.stats.is_none());
        assert_eq!(snap.hive_stats.last_error.as_deref(), Some("HTTP 503"));
        assert_eq!(snap.errors.active_count(), 0);
    }
}
