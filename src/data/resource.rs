//! Container resource samples.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Run state of a container as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Stopped,
    Restarting,
    /// Expected by configuration but not present in the runtime.
    Missing,
    /// The runtime could not be queried.
    #[default]
    Unknown,
}

impl RunState {
    /// Map a `docker ps` `State` value.
    pub fn from_docker(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "running" => RunState::Running,
            "restarting" => RunState::Restarting,
            "exited" | "dead" | "paused" | "created" | "removing" => RunState::Stopped,
            _ => RunState::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Stopped => "stopped",
            RunState::Restarting => "restarting",
            RunState::Missing => "missing",
            RunState::Unknown => "unknown",
        }
    }
}

/// CPU and memory marks above which a container counts as starved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighWater {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl Default for HighWater {
    fn default() -> Self {
        Self {
            cpu_percent: 90.0,
            memory_percent: 90.0,
        }
    }
}

/// Latest resource reading for one container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSample {
    pub container: String,
    pub cpu_percent: Option<f64>,
    pub memory_used: Option<u64>,
    pub memory_limit: Option<u64>,
    pub memory_percent: Option<f64>,
    pub run_state: RunState,
    /// Time since the container started, as the runtime words it.
    pub uptime: Option<String>,
    pub sampled_at: DateTime<Utc>,
}

impl ResourceSample {
    /// A sample with no readings, only a run state.
    pub fn bare(container: impl Into<String>, run_state: RunState, at: DateTime<Utc>) -> Self {
        Self {
            container: container.into(),
            cpu_percent: None,
            memory_used: None,
            memory_limit: None,
            memory_percent: None,
            run_state,
            uptime: None,
            sampled_at: at,
        }
    }

    /// Memory percentage, derived from used/limit when the runtime omitted it.
    pub fn memory_ratio(&self) -> Option<f64> {
        self.memory_percent.or_else(|| match (self.memory_used, self.memory_limit) {
            (Some(used), Some(limit)) if limit > 0 => Some(used as f64 / limit as f64 * 100.0),
            _ => None,
        })
    }

    /// Describe the first exceeded mark, if any.
    pub fn exceeds(&self, marks: &HighWater) -> Option<String> {
        if let Some(cpu) = self.cpu_percent {
            if cpu >= marks.cpu_percent {
                return Some(format!("CPU at {cpu:.1}% (limit {:.0}%)", marks.cpu_percent));
            }
        }
        if let Some(mem) = self.memory_ratio() {
            if mem >= marks.memory_percent {
                return Some(format!(
                    "memory at {mem:.1}% (limit {:.0}%)",
                    marks.memory_percent
                ));
            }
        }
        None
    }
}

/// Format a byte count with binary units ("512MiB", "1.9GiB").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 || value >= 100.0 {
        format!("{:.0}{}", value, UNITS[unit])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}
