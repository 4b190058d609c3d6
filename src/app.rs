//! Application state for the render loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::aggregator::{Aggregator, DashboardSnapshot};
use crate::data::HighWater;
use crate::layout::{self, DashboardLayout};
use crate::ui::Theme;

/// How long a status message stays in the status bar.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Main application state.
///
/// Owns nothing that workers write to; everything it shows comes from one
/// [`Aggregator::snapshot`] per frame.
pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub theme: Theme,
    pub layout: DashboardLayout,

    aggregator: Arc<Aggregator>,
    last_size: Option<(u16, u16)>,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an app reading from `aggregator`, with the theme picked from
    /// the terminal background.
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self::with_theme(aggregator, Theme::auto_detect())
    }

    pub fn with_theme(aggregator: Arc<Aggregator>, theme: Theme) -> Self {
        Self {
            running: true,
            show_help: false,
            theme,
            layout: layout::select(0, 0),
            aggregator,
            last_size: None,
            status_message: None,
        }
    }

    /// Record the current terminal size, re-selecting the layout if it
    /// changed. Returns whether it did.
    pub fn observe_size(&mut self, width: u16, height: u16) -> bool {
        if self.last_size == Some((width, height)) {
            return false;
        }

        let previous = self.layout.variant;
        self.layout = layout::select(width, height);
        self.last_size = Some((width, height));
        self.aggregator.set_terminal_size(width, height);

        if self.layout.variant != previous {
            tracing::debug!(
                width,
                height,
                layout = self.layout.variant.label(),
                "Layout changed"
            );
        }
        true
    }

    /// One consistent copy of the monitored state for this frame.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.aggregator.snapshot()
    }

    pub fn high_water(&self) -> &HighWater {
        &self.aggregator.policy().high_water
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Write the current snapshot as pretty JSON.
    pub fn export_state(&self, path: &Path) -> Result<()> {
        write_snapshot(&self.snapshot(), path)
    }
}

/// Timestamped file name for interactive exports.
pub fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "fleetwatch_export_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Serialize `snapshot` to `path` as pretty JSON.
pub fn write_snapshot(snapshot: &DashboardSnapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorPolicy;
    use crate::data::ServiceTarget;
    use crate::layout::LayoutVariant;

    fn app() -> App {
        let target = ServiceTarget::new(
            "video-transcoder",
            "http://localhost:8081",
            "http://localhost:8081/healthz",
            "localhost",
            Duration::from_secs(10),
            Duration::from_secs(5),
        );
        let aggregator = Arc::new(Aggregator::new(
            vec![target],
            Vec::new(),
            AggregatorPolicy::default(),
        ));
        App::with_theme(aggregator, Theme::dark())
    }

    #[test]
    fn resize_reselects_layout() {
        let mut app = app();
        assert!(app.observe_size(100, 24));
        assert_eq!(app.layout.variant, LayoutVariant::Small);
        assert!(!app.observe_size(100, 24));

        assert!(app.observe_size(100, 40));
        assert_eq!(app.layout.variant, LayoutVariant::Medium);
        assert_eq!(app.snapshot().terminal, (100, 40));
    }

    #[test]
    fn status_message_is_visible() {
        let mut app = app();
        assert!(app.get_status_message().is_none());
        app.set_status_message("Exported".into());
        assert_eq!(app.get_status_message(), Some("Exported"));
    }

    #[test]
    fn export_writes_snapshot_json() {
        let app = app();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        app.export_state(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["services"][0]["name"], "video-transcoder");
        assert_eq!(value["services"][0]["status"], "unknown");
    }

    #[test]
    fn default_export_path_is_timestamped() {
        let path = default_export_path();
        let name = path.to_string_lossy();
        assert!(name.starts_with("fleetwatch_export_"));
        assert!(name.ends_with(".json"));
    }
}
