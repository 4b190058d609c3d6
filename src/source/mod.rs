//! Pollers that feed the aggregator.
//!
//! Each external signal (one service's health endpoint, the container
//! runtime, connectivity, throughput, one log endpoint, community stats) is
//! checked by its own [`Poller`]. A poller owns whatever per-source state it
//! needs (a log cursor, an HTTP client) and only ever talks to the outside
//! world through the [`Aggregator`]'s `apply_*` methods.

pub mod health;
pub mod hive;
pub mod logs;
pub mod network;
pub mod resources;

pub use health::{parse_health_payload, HealthProber};
pub use hive::{parse_hive_stats, HiveStatsPoller};
pub use logs::{LogRecord, LogTailer};
pub use network::{parse_speedtest_json, LatencyProber, ThroughputProber};
pub use resources::{ContainerRuntime, DockerCli, ResourceCollector};

use std::fmt::Debug;
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::aggregator::Aggregator;
use crate::error::ProbeError;

/// A worker that periodically checks one external signal.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use fleetwatch::{Aggregator, Poller, LatencyProber};
///
/// # tokio_test::block_on(async {
/// let aggregator = Aggregator::new(Vec::new(), Vec::new(), Default::default());
/// let client = reqwest::Client::new();
/// let mut prober = LatencyProber::new(
///     client,
///     "https://1.1.1.1",
///     Duration::from_secs(10),
///     Duration::from_secs(5),
/// );
/// prober.poll(&aggregator).await;
/// println!("{:?}", aggregator.snapshot().network.connectivity);
/// # });
/// ```
#[async_trait]
pub trait Poller: Send + Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Time between polls.
    fn interval(&self) -> Duration;

    /// Run one check and apply its outcome.
    ///
    /// Must not panic on remote failure; every failure is an outcome.
    async fn poll(&mut self, aggregator: &Aggregator);
}

/// Run a subprocess to completion with a timeout.
///
/// The child is killed if the timeout fires or the future is dropped.
pub(crate) async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<Output, ProbeError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ProbeError::Unavailable(format!("{program} not found")));
        }
        Ok(Err(e)) => return Err(ProbeError::Command(format!("{program}: {e}"))),
        Err(_) => return Err(ProbeError::Timeout),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("no output");
        return Err(ProbeError::Command(format!(
            "{program} exited with {}: {}",
            output.status,
            reason.trim()
        )));
    }

    Ok(output)
}
