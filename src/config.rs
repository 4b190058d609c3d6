//! Settings loading and validation.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then `FLEETWATCH__`-prefixed environment variables
//! (`FLEETWATCH__NETWORK__INTERVAL=30s`).

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::warn;

use crate::aggregator::AggregatorPolicy;
use crate::data::duration;
use crate::data::{HighWater, ResolutionPolicy, ServiceTarget};

/// Default settings file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fleetwatch.toml";

/// How a service's health endpoint is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// Parse the JSON payload for status and authentication fields.
    #[default]
    Json,
    /// Any 2xx response counts as up.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default)]
    pub check: CheckKind,
    #[serde(default)]
    pub container: Option<String>,
    /// Label for per-host grouping; defaults to the host in `base_url`.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_poll_interval", deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(default = "default_probe_timeout", deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

impl ServiceConfig {
    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }

    pub fn host_label(&self) -> String {
        if let Some(host) = &self.host {
            return host.clone();
        }
        reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "local".to_string())
    }

    /// Build the initial dashboard entry for this service.
    pub fn target(&self) -> ServiceTarget {
        let target = ServiceTarget::new(
            &self.name,
            &self.base_url,
            self.health_url(),
            self.host_label(),
            self.interval,
            self.timeout,
        );
        match &self.container {
            Some(container) => target.with_container(container),
            None => target,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSourceConfig {
    pub id: String,
    pub url: String,
    /// Service that alerts from this source are attributed to.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default = "default_poll_interval", deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(default = "default_probe_timeout", deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub enabled: bool,
    /// Container runtime CLI.
    pub command: String,
    /// Containers to watch in addition to the ones named by services.
    pub containers: Vec<String>,
    #[serde(deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "docker".to_string(),
            containers: Vec::new(),
            interval: default_poll_interval(),
            timeout: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connectivity_url: String,
    #[serde(deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
    pub speedtest_enabled: bool,
    #[serde(deserialize_with = "duration::deserialize")]
    pub speedtest_interval: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub speedtest_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connectivity_url: "https://1.1.1.1".to_string(),
            interval: default_poll_interval(),
            timeout: default_probe_timeout(),
            speedtest_enabled: true,
            speedtest_interval: Duration::from_secs(300),
            speedtest_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HiveStatsConfig {
    pub enabled: bool,
    pub url: String,
    #[serde(deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

impl Default for HiveStatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://stats.hivehub.dev/communities?c=hive-173115".to_string(),
            interval: Duration::from_secs(300),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Top-level dashboard settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "duration::deserialize")]
    pub render_interval: Duration,
    pub failure_threshold: u32,
    pub resolve_after_cycles: u32,
    #[serde(deserialize_with = "duration::deserialize")]
    pub quiet_period: Duration,
    pub log_window: usize,
    pub cpu_high_water: f64,
    pub memory_high_water: f64,
    pub resources: ResourceConfig,
    pub network: NetworkConfig,
    pub hive_stats: HiveStatsConfig,
    pub services: Vec<ServiceConfig>,
    pub logs: Vec<LogSourceConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render_interval: Duration::from_secs(1),
            failure_threshold: 3,
            resolve_after_cycles: 3,
            quiet_period: Duration::from_secs(600),
            log_window: 50,
            cpu_high_water: 90.0,
            memory_high_water: 90.0,
            resources: ResourceConfig::default(),
            network: NetworkConfig::default(),
            hive_stats: HiveStatsConfig::default(),
            services: default_services(),
            logs: default_logs(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    ///
    /// The file is required only when `explicit` is set (given via `--config`).
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if explicit && !path.exists() {
            bail!("Config file not found: {}", path.display());
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(explicit))
            .add_source(
                Environment::with_prefix("FLEETWATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let mut settings: Settings =
            config.try_deserialize().context("Invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject unusable settings and clamp timeouts below their intervals.
    pub fn validate(&mut self) -> Result<()> {
        if self.failure_threshold == 0 {
            bail!("failure_threshold must be at least 1");
        }
        if self.log_window == 0 {
            bail!("log_window must be at least 1");
        }
        if self.render_interval.is_zero() {
            bail!("render_interval must be greater than zero");
        }

        for service in &mut self.services {
            if service.name.trim().is_empty() {
                bail!("Service with base_url {} has an empty name", service.base_url);
            }
            clamp_timeout(&service.name, service.interval, &mut service.timeout);
        }
        for log in &mut self.logs {
            if log.id.trim().is_empty() {
                bail!("Log source with url {} has an empty id", log.url);
            }
            clamp_timeout(&log.id, log.interval, &mut log.timeout);
        }
        clamp_timeout("resources", self.resources.interval, &mut self.resources.timeout);
        clamp_timeout("network", self.network.interval, &mut self.network.timeout);
        clamp_timeout(
            "speedtest",
            self.network.speedtest_interval,
            &mut self.network.speedtest_timeout,
        );
        clamp_timeout("hive-stats", self.hive_stats.interval, &mut self.hive_stats.timeout);

        let mut names: Vec<&str> = self.services.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            bail!("Duplicate service name: {}", pair[0]);
        }

        Ok(())
    }

    pub fn policy(&self) -> AggregatorPolicy {
        AggregatorPolicy {
            failure_threshold: self.failure_threshold,
            high_water: HighWater {
                cpu_percent: self.cpu_high_water,
                memory_percent: self.memory_high_water,
            },
            resolution: ResolutionPolicy {
                healthy_cycles: self.resolve_after_cycles,
                quiet_period: self.quiet_period,
            },
            log_window: self.log_window,
        }
    }

    /// Every container the resource collector should report on.
    pub fn expected_containers(&self) -> Vec<String> {
        let mut containers: Vec<String> = self
            .services
            .iter()
            .filter_map(|s| s.container.clone())
            .chain(self.resources.containers.iter().cloned())
            .collect();
        containers.sort();
        containers.dedup();
        containers
    }
}

fn clamp_timeout(name: &str, interval: Duration, timeout: &mut Duration) {
    if *timeout >= interval {
        let clamped = interval.mul_f64(0.75);
        warn!(
            source = name,
            timeout = ?timeout,
            interval = ?interval,
            clamped = ?clamped,
            "Timeout not shorter than interval, clamping"
        );
        *timeout = clamped;
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_services() -> Vec<ServiceConfig> {
    let service = |name: &str, port: u16, path: &str, container: Option<&str>| ServiceConfig {
        name: name.to_string(),
        base_url: format!("http://localhost:{port}"),
        health_path: path.to_string(),
        check: CheckKind::Json,
        container: container.map(str::to_string),
        host: None,
        interval: default_poll_interval(),
        timeout: default_probe_timeout(),
    };
    vec![
        service("video-transcoder", 8081, "/healthz", Some("video-worker")),
        service("instagram-downloader", 6666, "/health", Some("ytipfs-worker")),
        service("account-manager", 3001, "/health", None),
    ]
}

fn default_logs() -> Vec<LogSourceConfig> {
    let source = |id: &str, url: &str, service: &str| LogSourceConfig {
        id: id.to_string(),
        url: url.to_string(),
        service: Some(service.to_string()),
        interval: default_poll_interval(),
        timeout: default_probe_timeout(),
    };
    vec![
        source("transcoder", "http://localhost:8081/logs", "video-transcoder"),
        source("instagram", "http://localhost:6666/logs", "instagram-downloader"),
    ]
}
