//! Container resource collection from the local runtime.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{run_command, Poller};
use crate::aggregator::Aggregator;
use crate::data::{ResourceSample, RunState};
use crate::error::ProbeError;

/// A container as listed by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStatus {
    pub name: String,
    pub state: RunState,
    /// How long the container has been up, in the runtime's own words.
    pub uptime: Option<String>,
}

/// CPU and memory readings for one running container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStats {
    pub name: String,
    pub cpu_percent: Option<f64>,
    pub memory_used: Option<u64>,
    pub memory_limit: Option<u64>,
    pub memory_percent: Option<f64>,
}

/// Access to a local container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + Debug {
    /// All containers, running or not.
    async fn list(&self) -> Result<Vec<ContainerStatus>, ProbeError>;

    /// One-shot readings for running containers.
    async fn stats(&self) -> Result<Vec<ContainerStats>, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct StatsLine {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "CPUPerc", default)]
    cpu: String,
    #[serde(rename = "MemUsage", default)]
    mem_usage: String,
    #[serde(rename = "MemPerc", default)]
    mem_perc: String,
}

/// The Docker CLI, driven with `--format '{{json .}}'`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    command: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    async fn json_lines(&self, args: &[&str]) -> Result<String, ProbeError> {
        let output = run_command(&self.command, args, self.timeout).await?;
        String::from_utf8(output.stdout).map_err(|e| ProbeError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list(&self) -> Result<Vec<ContainerStatus>, ProbeError> {
        let out = self.json_lines(&["ps", "-a", "--format", "{{json .}}"]).await?;
        Ok(parse_ps_lines(&out))
    }

    async fn stats(&self) -> Result<Vec<ContainerStats>, ProbeError> {
        let out = self
            .json_lines(&["stats", "--no-stream", "--format", "{{json .}}"])
            .await?;
        Ok(parse_stats_lines(&out))
    }
}

/// Parse `docker ps --format '{{json .}}'` output.
///
/// Lines that are not valid JSON are skipped with a warning.
pub fn parse_ps_lines(out: &str) -> Vec<ContainerStatus> {
    let mut containers = Vec::new();
    for line in out.lines().filter(|l| !l.trim().is_empty()) {
        let ps: PsLine = match serde_json::from_str(line) {
            Ok(ps) => ps,
            Err(e) => {
                warn!(error = %e, line, "Skipping unparsable docker ps line");
                continue;
            }
        };
        let state = RunState::from_docker(&ps.state);
        let uptime = parse_uptime(&ps.status);
        // A container can carry several comma-separated names
        for name in ps.names.split(',').map(|n| n.trim().trim_start_matches('/')) {
            if !name.is_empty() {
                containers.push(ContainerStatus {
                    name: name.to_string(),
                    state,
                    uptime: uptime.clone(),
                });
            }
        }
    }
    containers
}

/// Parse `docker stats --no-stream --format '{{json .}}'` output.
///
/// Lines that are not valid JSON are skipped with a warning.
pub fn parse_stats_lines(out: &str) -> Vec<ContainerStats> {
    out.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<StatsLine>(line) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, line, "Skipping unparsable docker stats line");
                None
            }
        })
        .map(|s| {
            let (memory_used, memory_limit) = parse_mem_usage(&s.mem_usage);
            ContainerStats {
                name: s.name.trim_start_matches('/').to_string(),
                cpu_percent: parse_percent(&s.cpu),
                memory_used,
                memory_limit,
                memory_percent: parse_percent(&s.mem_perc),
            }
        })
        .collect()
}

/// Uptime from a `docker ps` status such as "Up 2 hours (healthy)".
///
/// Containers that are not up have no uptime.
pub fn parse_uptime(status: &str) -> Option<String> {
    let rest = status.trim().strip_prefix("Up ")?;
    let rest = match rest.find(" (") {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_ascii_lowercase())
}

/// Parse "12.5%" (or "--") into a number.
pub fn parse_percent(s: &str) -> Option<f64> {
    s.trim().trim_end_matches('%').trim().parse().ok()
}

/// Parse "12.3MiB / 1.9GiB" into (used, limit) bytes.
pub fn parse_mem_usage(s: &str) -> (Option<u64>, Option<u64>) {
    let mut parts = s.split('/');
    let used = parts.next().and_then(parse_size);
    let limit = parts.next().and_then(parse_size);
    (used, limit)
}

/// Parse a size like "1.9GiB", "512kB" or "0B" into bytes.
pub fn parse_size(s: &str) -> Option<u64> {
    const UNITS: &[(&str, f64)] = &[
        ("KiB", 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("TiB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("kB", 1e3),
        ("KB", 1e3),
        ("MB", 1e6),
        ("GB", 1e9),
        ("TB", 1e12),
        ("B", 1.0),
    ];

    let s = s.trim();
    for (suffix, multiplier) in UNITS {
        if let Some(num) = s.strip_suffix(suffix) {
            let value: f64 = num.trim().parse().ok()?;
            if value < 0.0 || !value.is_finite() {
                return None;
            }
            return Some((value * multiplier) as u64);
        }
    }
    None
}

/// Reports run state and usage for the expected containers.
///
/// With no expected containers configured, every listed container is
/// reported instead.
#[derive(Debug)]
pub struct ResourceCollector {
    runtime: Box<dyn ContainerRuntime>,
    expected: Vec<String>,
    interval: Duration,
}

impl ResourceCollector {
    pub fn new(runtime: Box<dyn ContainerRuntime>, expected: Vec<String>, interval: Duration) -> Self {
        Self {
            runtime,
            expected,
            interval,
        }
    }

    /// Query the runtime once.
    ///
    /// Never fails: an unreachable runtime yields `unknown` samples.
    pub async fn collect(&self) -> Vec<ResourceSample> {
        let now = Utc::now();

        let listed = match self.runtime.list().await {
            Ok(listed) => listed,
            Err(e) => {
                warn!(error = %e, "Container runtime unavailable");
                return self
                    .expected
                    .iter()
                    .map(|name| ResourceSample::bare(name, RunState::Unknown, now))
                    .collect();
            }
        };

        let stats = if listed.iter().any(|c| c.state == RunState::Running) {
            self.runtime.stats().await.unwrap_or_else(|e| {
                warn!(error = %e, "Container stats unavailable");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let names: Vec<String> = if self.expected.is_empty() {
            listed.iter().map(|c| c.name.clone()).collect()
        } else {
            self.expected.clone()
        };

        names
            .into_iter()
            .map(|name| {
                let Some(container) = listed.iter().find(|c| c.name == name) else {
                    return ResourceSample::bare(name, RunState::Missing, now);
                };
                let mut sample = ResourceSample::bare(&name, container.state, now);
                sample.uptime = container.uptime.clone();
                if let Some(s) = stats.iter().find(|s| s.name == name) {
                    sample.cpu_percent = s.cpu_percent;
                    sample.memory_used = s.memory_used;
                    sample.memory_limit = s.memory_limit;
                    sample.memory_percent = s.memory_percent;
                }
                sample
            })
            .collect()
    }
}

#[async_trait]
impl Poller for ResourceCollector {
    fn name(&self) -> &str {
        "resources"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&mut self, aggregator: &Aggregator) {
        let samples = self.collect().await;
        debug!(containers = samples.len(), "Resource sample");
        aggregator.apply_resources(samples);
    }
}
