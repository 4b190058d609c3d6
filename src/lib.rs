//! # fleetwatch
//!
//! A live terminal dashboard and library for watching a small fleet of
//! self-hosted services: health endpoints, container resources, internet
//! connectivity and the services' own log streams.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  tokio workers (one per source)          main thread         │
//! │  ┌──────────────┐                                            │
//! │  │ HealthProber │──┐                                         │
//! │  │ LogTailer    │──┤ apply_*()  ┌────────────┐  snapshot()   │
//! │  │ Resource…    │──┼───────────▶│ Aggregator │──────────┐    │
//! │  │ Latency…     │──┤            └────────────┘          ▼    │
//! │  │ Throughput…  │──┘                              ┌─────────┐│
//! │  └──────┬───────┘                                 │ app + ui││
//! │         │ watch::channel(bool)  ◀──── quit ───────└─────────┘│
//! └─────────┴────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: the [`Poller`] trait and one poller per kind of signal
//! - **[`aggregator`]**: the single owner of dashboard state; pollers write
//!   through narrow `apply_*` methods, the renderer reads a cloned
//!   [`DashboardSnapshot`]
//! - **[`data`]**: state models (services, resources, logs, error events,
//!   community stats)
//! - **[`monitor`]**: spawns pollers and shuts them down
//! - **[`layout`]**: picks panels for the terminal size
//! - **[`ui`]**: ratatui rendering of those panels
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch the services in ./fleetwatch.toml (or the built-in defaults)
//! fleetwatch
//!
//! # One poll round, written as JSON
//! fleetwatch --export snapshot.json
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::time::Duration;
//! use fleetwatch::{Monitor, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! let monitor = Monitor::start(&settings).unwrap();
//!
//! tokio::time::sleep(Duration::from_secs(5)).await;
//! let snapshot = monitor.aggregator().snapshot();
//! for service in &snapshot.services {
//!     println!("{}: {}", service.name, service.status.label());
//! }
//!
//! monitor.shutdown(Duration::from_secs(2)).await;
//! # });
//! ```

pub mod aggregator;
pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod layout;
pub mod logging;
pub mod monitor;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use aggregator::{Aggregator, AggregatorPolicy, DashboardSnapshot};
pub use app::App;
pub use config::Settings;
pub use data::{ErrorCategory, ErrorEvent, HealthStatus, LogEntry, ServiceTarget, Severity};
pub use error::ProbeError;
pub use layout::{DashboardLayout, LayoutVariant, Panel};
pub use monitor::Monitor;
pub use source::{
    HealthProber, HiveStatsPoller, LatencyProber, LogTailer, Poller, ResourceCollector,
    ThroughputProber,
};
