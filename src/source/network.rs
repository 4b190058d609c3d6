//! Connectivity and throughput probes.
//!
//! The two run as separate workers: the latency check is cheap and frequent,
//! while a speed test takes tens of seconds and runs every few minutes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{run_command, Poller};
use crate::aggregator::Aggregator;
use crate::data::SpeedTestResult;
use crate::error::ProbeError;

/// Speed test commands tried in order until one is installed.
const SPEEDTEST_COMMANDS: &[(&str, &[&str])] = &[
    ("speedtest", &["--format=json", "--accept-license", "--accept-gdpr"]),
    ("speedtest-cli", &["--json"]),
];

/// Checks that the internet is reachable and how quickly.
#[derive(Debug)]
pub struct LatencyProber {
    client: Client,
    url: String,
    interval: Duration,
    timeout: Duration,
}

impl LatencyProber {
    pub fn new(client: Client, url: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            interval,
            timeout,
        }
    }

    /// Any HTTP response counts as online; only transport failures don't.
    pub async fn probe(&self) -> Result<Duration, ProbeError> {
        let started = Instant::now();
        self.client.get(&self.url).timeout(self.timeout).send().await?;
        Ok(started.elapsed())
    }
}

#[async_trait]
impl Poller for LatencyProber {
    fn name(&self) -> &str {
        "network"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&mut self, aggregator: &Aggregator) {
        let outcome = self.probe().await;
        debug!(ok = outcome.is_ok(), "Connectivity check");
        aggregator.apply_connectivity(outcome);
    }
}

#[derive(Debug, Deserialize)]
struct OoklaTransfer {
    /// Bytes per second.
    bandwidth: f64,
}

#[derive(Debug, Deserialize)]
struct OoklaPing {
    latency: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpeedTestOutput {
    /// `speedtest --format=json` (Ookla).
    Ookla {
        download: OoklaTransfer,
        upload: OoklaTransfer,
        ping: OoklaPing,
    },
    /// `speedtest-cli --json`, in bits per second.
    Cli { download: f64, upload: f64, ping: f64 },
}

/// Parse the JSON output of either supported speed test CLI.
pub fn parse_speedtest_json(body: &[u8]) -> Result<SpeedTestResult, ProbeError> {
    let output: SpeedTestOutput =
        serde_json::from_slice(body).map_err(|e| ProbeError::Malformed(e.to_string()))?;

    Ok(match output {
        SpeedTestOutput::Ookla {
            download,
            upload,
            ping,
        } => SpeedTestResult {
            download_mbps: download.bandwidth * 8.0 / 1e6,
            upload_mbps: upload.bandwidth * 8.0 / 1e6,
            ping_ms: ping.latency,
        },
        SpeedTestOutput::Cli {
            download,
            upload,
            ping,
        } => SpeedTestResult {
            download_mbps: download / 1e6,
            upload_mbps: upload / 1e6,
            ping_ms: ping,
        },
    })
}

/// Periodically runs an external speed test.
#[derive(Debug)]
pub struct ThroughputProber {
    commands: Vec<(String, Vec<String>)>,
    interval: Duration,
    timeout: Duration,
}

impl ThroughputProber {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        let commands = SPEEDTEST_COMMANDS
            .iter()
            .map(|(program, args)| {
                (program.to_string(), args.iter().map(|a| a.to_string()).collect())
            })
            .collect();
        Self::with_commands(commands, interval, timeout)
    }

    /// Use a custom list of (program, args) candidates.
    pub fn with_commands(
        commands: Vec<(String, Vec<String>)>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            commands,
            interval,
            timeout,
        }
    }

    /// Run the first available speed test command.
    pub async fn measure(&self) -> Result<SpeedTestResult, ProbeError> {
        for (program, args) in &self.commands {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            match run_command(program, &args, self.timeout).await {
                Ok(output) => return parse_speedtest_json(&output.stdout),
                Err(ProbeError::Unavailable(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ProbeError::Unavailable("no speed test CLI installed".to_string()))
    }
}

#[async_trait]
impl Poller for ThroughputProber {
    fn name(&self) -> &str {
        "speedtest"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&mut self, aggregator: &Aggregator) {
        aggregator.begin_throughput();
        let outcome = self.measure().await;
        match &outcome {
            Ok(r) => info!(
                download_mbps = r.download_mbps,
                upload_mbps = r.upload_mbps,
                ping_ms = r.ping_ms,
                "Speed test finished"
            ),
            Err(e) => warn!(error = %e, "Speed test failed"),
        }
        aggregator.apply_throughput(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorPolicy;
    use crate::data::{Connectivity, Throughput};
    use crate::source::test_support::{serve, serve_stalled};

    #[test]
    fn parses_ookla_output() {
        let body = br#"{"type":"result","ping":{"jitter":0.4,"latency":11.5},
            "download":{"bandwidth":12500000,"bytes":1},"upload":{"bandwidth":2500000,"bytes":1}}"#;
        let r = parse_speedtest_json(body).unwrap();
        assert_eq!(r.download_mbps, 100.0);
        assert_eq!(r.upload_mbps, 20.0);
        assert_eq!(r.ping_ms, 11.5);
    }

    #[test]
    fn parses_speedtest_cli_output() {
        let body = br#"{"download":93000000.5,"upload":41000000.0,"ping":18.2,"server":{}}"#;
        let r = parse_speedtest_json(body).unwrap();
        assert!((r.download_mbps - 93.0).abs() < 0.001);
        assert_eq!(r.ping_ms, 18.2);
    }

    #[test]
    fn rejects_unknown_output() {
        assert!(matches!(
            parse_speedtest_json(b"{\"error\":\"no servers\"}"),
            Err(ProbeError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn error_status_still_counts_as_online() {
        let base = serve(503, "{}").await;
        let mut prober = LatencyProber::new(
            Client::new(),
            base,
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        let aggregator = Aggregator::new(Vec::new(), Vec::new(), AggregatorPolicy::default());
        prober.poll(&aggregator).await;
        assert_eq!(aggregator.snapshot().network.connectivity, Connectivity::Online);
    }

    #[tokio::test]
    async fn stalled_endpoint_is_offline() {
        let base = serve_stalled().await;
        let mut prober = LatencyProber::new(
            Client::new(),
            base,
            Duration::from_secs(10),
            Duration::from_millis(200),
        );
        let aggregator = Aggregator::new(Vec::new(), Vec::new(), AggregatorPolicy::default());
        prober.poll(&aggregator).await;
        let snap = aggregator.snapshot();
        assert_eq!(snap.network.connectivity, Connectivity::Offline);
        assert_eq!(snap.network.last_error.as_deref(), Some("Request timed out"));
    }

    #[tokio::test]
    async fn missing_speedtest_degrades_to_unknown() {
        let mut prober = ThroughputProber::with_commands(
            vec![("fleetwatch-no-such-speedtest".to_string(), Vec::new())],
            Duration::from_secs(300),
            Duration::from_secs(5),
        );
        let aggregator = Aggregator::new(Vec::new(), Vec::new(), AggregatorPolicy::default());
        prober.poll(&aggregator).await;
        assert!(matches!(
            aggregator.snapshot().network.throughput,
            Throughput::Unknown { .. }
        ));
    }
}
