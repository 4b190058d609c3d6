//! Worker harness: spawning pollers and shutting them down.
//!
//! ```text
//! ┌──────────────┐   apply_*()   ┌────────────┐  snapshot()  ┌──────────┐
//! │ Poller tasks │──────────────▶│ Aggregator │─────────────▶│ Renderer │
//! └──────┬───────┘               └────────────┘              └────┬─────┘
//!        │ select!                                                │ quit
//!        └───────────────── watch::channel(bool) ◀────────────────┘
//! ```
//!
//! Every worker selects on the shutdown flag both between polls and while a
//! poll is in flight, so a stuck request is dropped the moment shutdown is
//! requested.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::config::Settings;
use crate::source::{
    DockerCli, HealthProber, HiveStatsPoller, LatencyProber, LogTailer, Poller, ResourceCollector,
    ThroughputProber,
};

/// Shortest interval a worker may run at.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Build the shared HTTP client for all HTTP checks.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("fleetwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Build one poller per configured data source.
///
/// The throughput worker is left out when `include_slow` is false.
pub fn build_pollers(settings: &Settings, client: &Client, include_slow: bool) -> Vec<Box<dyn Poller>> {
    let mut pollers: Vec<Box<dyn Poller>> = Vec::new();

    for service in &settings.services {
        pollers.push(Box::new(HealthProber::new(client.clone(), service)));
    }

    if settings.resources.enabled {
        let runtime = DockerCli::new(&settings.resources.command, settings.resources.timeout);
        pollers.push(Box::new(ResourceCollector::new(
            Box::new(runtime),
            settings.expected_containers(),
            settings.resources.interval,
        )));
    }

    let network = &settings.network;
    pollers.push(Box::new(LatencyProber::new(
        client.clone(),
        &network.connectivity_url,
        network.interval,
        network.timeout,
    )));
    if include_slow && network.speedtest_enabled {
        pollers.push(Box::new(ThroughputProber::new(
            network.speedtest_interval,
            network.speedtest_timeout,
        )));
    }

    for source in &settings.logs {
        pollers.push(Box::new(LogTailer::new(client.clone(), source)));
    }

    if settings.hive_stats.enabled {
        pollers.push(Box::new(HiveStatsPoller::new(client.clone(), &settings.hive_stats)));
    }

    pollers
}

/// Spawn a worker that polls on its interval until shutdown is signalled.
pub fn spawn_poller(
    mut poller: Box<dyn Poller>,
    aggregator: Arc<Aggregator>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(poller.interval().max(MIN_INTERVAL));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(worker = poller.name(), "Worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = poller.poll(&aggregator) => {}
                    }
                }
            }
        }

        debug!(worker = poller.name(), "Worker stopped");
    })
}

/// Running set of workers plus the shared state they feed.
#[derive(Debug)]
pub struct Monitor {
    aggregator: Arc<Aggregator>,
    shutdown: Arc<watch::Sender<bool>>,
    workers: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Start every configured worker. Must be called inside a tokio runtime.
    pub fn start(settings: &Settings) -> Result<Self> {
        let client = http_client()?;
        let aggregator = Arc::new(Aggregator::from_settings(settings));
        let monitor = Self::with_pollers(aggregator, build_pollers(settings, &client, true));
        monitor.listen_for_interrupt();
        Ok(monitor)
    }

    /// Start the given pollers against an existing aggregator.
    pub fn with_pollers(aggregator: Arc<Aggregator>, pollers: Vec<Box<dyn Poller>>) -> Self {
        let (tx, rx) = watch::channel(false);
        let workers = pollers
            .into_iter()
            .map(|poller| spawn_poller(poller, aggregator.clone(), rx.clone()))
            .collect::<Vec<_>>();
        info!(workers = workers.len(), "Monitor started");

        Self {
            aggregator,
            shutdown: Arc::new(tx),
            workers,
        }
    }

    /// Raise the shutdown flag on SIGINT.
    fn listen_for_interrupt(&self) {
        let tx = self.shutdown.clone();
        let mut rx = tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Interrupt received, shutting down");
                        let _ = tx.send(true);
                    }
                }
                _ = rx.changed() => {}
            }
        });
    }

    pub fn aggregator(&self) -> Arc<Aggregator> {
        self.aggregator.clone()
    }

    /// Receiver that flips to `true` when shutdown is requested.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn request_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Signal shutdown and wait up to `grace` for workers to exit.
    ///
    /// Workers still running after the grace period are aborted; returns
    /// how many had to be.
    pub async fn shutdown(self, grace: Duration) -> usize {
        let _ = self.shutdown.send(true);
        let deadline = Instant::now() + grace;
        let mut aborted = 0;

        for mut worker in self.workers {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                worker.abort();
                aborted += 1;
            }
        }

        if aborted > 0 {
            warn!(aborted, "Workers did not stop within the grace period");
        } else {
            info!("All workers stopped");
        }
        aborted
    }
}

/// Run every fast poller once, concurrently, and return the resulting state.
pub async fn poll_once(settings: &Settings) -> Result<Arc<Aggregator>> {
    let client = http_client()?;
    let aggregator = Arc::new(Aggregator::from_settings(settings));

    let mut set = JoinSet::new();
    for mut poller in build_pollers(settings, &client, false) {
        let aggregator = aggregator.clone();
        set.spawn(async move { poller.poll(&aggregator).await });
    }
    while let Some(result) = set.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Poll task failed");
        }
    }

    Ok(aggregator)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::aggregator::AggregatorPolicy;
    use crate::config::{CheckKind, ServiceConfig};
    use crate::data::HealthStatus;
    use crate::source::test_support::serve_stalled;

    #[derive(Debug)]
    struct Counting {
        polls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Poller for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn poll(&mut self, _aggregator: &Aggregator) {
            self.polls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct Stuck;

    #[async_trait]
    impl Poller for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn poll(&mut self, _aggregator: &Aggregator) {
            std::future::pending::<()>().await;
        }
    }

    fn empty_aggregator() -> Arc<Aggregator> {
        Arc::new(Aggregator::new(Vec::new(), Vec::new(), AggregatorPolicy::default()))
    }

    #[tokio::test]
    async fn polls_on_interval_until_shutdown() {
        let polls = Arc::new(AtomicUsize::new(0));
        let monitor = Monitor::with_pollers(
            empty_aggregator(),
            vec![Box::new(Counting { polls: polls.clone() })],
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(monitor.shutdown(Duration::from_secs(1)).await, 0);

        let seen = polls.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected repeated polls, got {seen}");
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(polls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn in_flight_poll_is_cancelled_on_shutdown() {
        let monitor = Monitor::with_pollers(empty_aggregator(), vec![Box::new(Stuck)]);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        assert_eq!(monitor.shutdown(Duration::from_secs(2)).await, 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stalled_health_check_stops_within_timeout() {
        let base = serve_stalled().await;
        let service = ServiceConfig {
            name: "video-transcoder".into(),
            base_url: base,
            health_path: "/healthz".into(),
            check: CheckKind::Json,
            container: None,
            host: None,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        };
        let aggregator = Arc::new(Aggregator::new(
            vec![service.target()],
            Vec::new(),
            AggregatorPolicy::default(),
        ));
        let prober = HealthProber::new(Client::new(), &service);
        let monitor = Monitor::with_pollers(aggregator.clone(), vec![Box::new(prober)]);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        assert_eq!(monitor.shutdown(Duration::from_secs(5)).await, 0);
        assert!(started.elapsed() < Duration::from_secs(5));

        let snap = aggregator.snapshot();
        assert_eq!(snap.service("video-transcoder").unwrap().status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn shutdown_signal_is_observable() {
        let monitor = Monitor::with_pollers(empty_aggregator(), Vec::new());
        let mut rx = monitor.shutdown_signal();
        assert!(!monitor.shutdown_requested());
        monitor.request_shutdown();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn poll_once_without_sources() {
        let mut settings = Settings::default();
        settings.services.clear();
        settings.logs.clear();
        settings.resources.enabled = false;
        settings.hive_stats.enabled = false;
        settings.network.connectivity_url = serve_stalled().await;
        settings.network.timeout = Duration::from_millis(200);

        let aggregator = poll_once(&settings).await.unwrap();
        let snap = aggregator.snapshot();
        assert_eq!(snap.network.connectivity, crate::data::Connectivity::Offline);
    }
}
