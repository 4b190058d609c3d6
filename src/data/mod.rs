//! Data models for everything the dashboard tracks.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "10s", "500ms")
//! - [`service`]: Monitored services ([`ServiceTarget`], [`HealthStatus`], [`HealthReport`])
//! - [`resource`]: Container samples ([`ResourceSample`], [`RunState`])
//! - [`network`]: Connectivity and throughput ([`NetworkSample`], [`Throughput`])
//! - [`log`]: Log entries, severity and the dedup window ([`LogWindow`])
//! - [`alert`]: Alert categories and the [`ErrorLedger`]
//! - [`history`]: Latency history for sparklines
//! - [`hive`]: Hive community stats ([`HiveStatsState`])
//!
//! ## Data Flow
//!
//! ```text
//! prober outcome (HealthReport / ResourceSample / LogEntry / ...)
//!        │
//!        ▼
//! Aggregator::apply_*()
//!        │
//!        ├──▶ ServiceTarget / NetworkSample / LogWindow (latest state)
//!        │
//!        ├──▶ ErrorLedger::record() / healthy() (alert bookkeeping)
//!        │
//!        └──▶ LatencyHistory::record() (for sparklines)
//! ```

pub mod alert;
pub mod duration;
pub mod history;
pub mod hive;
pub mod log;
pub mod network;
pub mod resource;
pub mod service;

pub use alert::{categorize, ErrorCategory, ErrorEvent, ErrorLedger, EventState, ResolutionPolicy};
pub use history::LatencyHistory;
pub use hive::{Freshness, HiveStats, HiveStatsState};
pub use log::{LogEntry, LogWindow, Severity};
pub use network::{Connectivity, NetworkSample, SpeedTestResult, Throughput};
pub use resource::{HighWater, ResourceSample, RunState};
pub use service::{HealthIssue, HealthProbe, HealthReport, HealthStatus, ServiceTarget};
