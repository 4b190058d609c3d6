//! Terminal rendering using ratatui.
//!
//! Each panel is drawn by its own submodule from a single
//! [`DashboardSnapshot`] taken at the start of the frame; the current
//! [`DashboardLayout`](crate::layout::DashboardLayout) decides which panels
//! appear and how they are arranged.
//!
//! ## Submodules
//!
//! - [`internet`]: connectivity, latency and the last speed test
//! - [`services`]: service health (compact, detailed, grouped per host)
//! - [`resources`]: container CPU, memory, uptime and run state
//! - [`hive`]: Hive community stats with data freshness
//! - [`logs`]: merged recent logs or one pane per log source
//! - [`errors`]: recent error events or per-category summary
//! - [`common`]: header, status bar and help overlay
//! - [`theme`]: light/dark theme support with terminal auto-detection
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Internet (full width)                │
//! ├───────────────────┬──────────────────┤
//! │ Services          │ Logs             │
//! │ Resources         │ Errors           │
//! ├───────────────────┴──────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//! ```
//!
//! In a single column the panels are stacked in layout order.

pub mod common;
pub mod errors;
pub mod hive;
pub mod internet;
pub mod logs;
pub mod resources;
pub mod services;
pub mod theme;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

pub use theme::Theme;

use crate::aggregator::DashboardSnapshot;
use crate::app::App;
use crate::data::duration::format_age;
use crate::layout::Panel;

/// Border plus two lines of content.
const INTERNET_HEIGHT: u16 = 4;

/// Draw one frame.
pub fn draw(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Min(0),    // Panels
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    common::render_header(frame, app, snapshot, chunks[0]);
    render_panels(frame, app, snapshot, chunks[1]);
    common::render_status_bar(frame, app, snapshot, chunks[2]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}

fn render_panels(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let panels = &app.layout.panels;
    if app.layout.columns < 2 {
        render_stack(frame, app, snapshot, panels, area);
        return;
    }

    let (top, rest): (Vec<Panel>, Vec<Panel>) =
        panels.iter().partition(|p| **p == Panel::Internet);
    let (left, right): (Vec<Panel>, Vec<Panel>) =
        rest.into_iter().partition(|p| column_of(*p) == 0);

    let rows = Layout::vertical([
        Constraint::Length(if top.is_empty() { 0 } else { INTERNET_HEIGHT }),
        Constraint::Min(0),
    ])
    .split(area);
    render_stack(frame, app, snapshot, &top, rows[0]);

    let cols = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    render_stack(frame, app, snapshot, &left, cols[0]);
    render_stack(frame, app, snapshot, &right, cols[1]);
}

/// Left column for state tables, right column for text streams.
fn column_of(panel: Panel) -> usize {
    match panel {
        Panel::Internet
        | Panel::ServiceHealthCompact
        | Panel::ServiceHealthDetailed
        | Panel::ServiceHealthPerHost
        | Panel::Resources
        | Panel::HiveStats => 0,
        Panel::RecentLogs | Panel::PerSourceLogs | Panel::RecentErrors | Panel::ErrorSummary => 1,
    }
}

fn render_stack(
    frame: &mut Frame,
    app: &App,
    snapshot: &DashboardSnapshot,
    panels: &[Panel],
    area: Rect,
) {
    if panels.is_empty() {
        return;
    }

    let constraints: Vec<Constraint> =
        panels.iter().map(|p| panel_constraint(*p, snapshot)).collect();
    let areas = Layout::vertical(constraints).split(area);

    for (panel, area) in panels.iter().zip(areas.iter()) {
        render_panel(frame, app, snapshot, *panel, *area);
    }
}

/// Table panels take the rows they need; text panels share what is left.
fn panel_constraint(panel: Panel, snapshot: &DashboardSnapshot) -> Constraint {
    // Borders plus the table header
    let table = |rows: usize| Constraint::Length(rows.max(1) as u16 + 3);

    match panel {
        Panel::Internet => Constraint::Length(INTERNET_HEIGHT),
        Panel::ServiceHealthCompact | Panel::ServiceHealthDetailed => {
            table(snapshot.services.len())
        }
        Panel::ServiceHealthPerHost => {
            let hosts: BTreeSet<&str> = snapshot.services.iter().map(|s| s.host.as_str()).collect();
            table(snapshot.services.len() + hosts.len())
        }
        Panel::Resources => table(snapshot.resources.len()),
        Panel::HiveStats => table(hive::ROWS),
        Panel::RecentLogs | Panel::PerSourceLogs => Constraint::Fill(2),
        Panel::RecentErrors | Panel::ErrorSummary => Constraint::Fill(1),
    }
}

fn render_panel(
    frame: &mut Frame,
    app: &App,
    snapshot: &DashboardSnapshot,
    panel: Panel,
    area: Rect,
) {
    match panel {
        Panel::Internet => internet::render(frame, app, snapshot, area),
        Panel::ServiceHealthCompact => services::render_compact(frame, app, snapshot, area),
        Panel::ServiceHealthDetailed => services::render_detailed(frame, app, snapshot, area),
        Panel::ServiceHealthPerHost => services::render_per_host(frame, app, snapshot, area),
        Panel::Resources => resources::render(frame, app, snapshot, area),
        Panel::HiveStats => hive::render(frame, app, snapshot, area),
        Panel::RecentLogs => logs::render_recent(frame, app, snapshot, area),
        Panel::PerSourceLogs => logs::render_per_source(frame, app, snapshot, area),
        Panel::RecentErrors => errors::render_recent(frame, app, snapshot, area),
        Panel::ErrorSummary => errors::render_summary(frame, app, snapshot, area),
    }
}

/// Bordered block used by every panel.
pub(crate) fn panel_block(app: &App, title: impl Into<String>) -> Block<'static> {
    Block::default()
        .title(format!(" {} ", title.into()))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border))
}

/// "12s ago", or "-" when it never happened.
pub(crate) fn ago(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => {
            let elapsed = (Utc::now() - at).to_std().unwrap_or_default();
            format!("{} ago", format_age(elapsed))
        }
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ratatui::{backend::TestBackend, Terminal};

    use super::*;
    use crate::aggregator::{Aggregator, AggregatorPolicy};
    use crate::data::{HealthProbe, HealthReport, HiveStats, LogEntry, ServiceTarget, Severity};
    use crate::error::ProbeError;

    fn aggregator() -> Arc<Aggregator> {
        let service = |name: &str, host: &str| {
            ServiceTarget::new(
                name,
                format!("http://{host}:8081"),
                format!("http://{host}:8081/health"),
                host,
                Duration::from_secs(10),
                Duration::from_secs(5),
            )
        };
        Arc::new(Aggregator::new(
            vec![
                service("video-transcoder", "localhost"),
                service("account-manager", "db-box"),
            ],
            vec![("transcoder".into(), Some("video-transcoder".into()))],
            AggregatorPolicy::default(),
        ))
    }

    fn render(app: &mut App, width: u16, height: u16) -> String {
        app.observe_size(width, height);
        let snapshot = app.snapshot();
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| draw(frame, app, &snapshot)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn empty_state_renders_at_every_size() {
        let mut app = App::with_theme(aggregator(), Theme::dark());
        for (w, h) in [(20, 5), (80, 24), (100, 40), (160, 60), (1, 1)] {
            render(&mut app, w, h);
        }

        let small = render(&mut app, 100, 24);
        assert!(small.contains("video-transcoder"));
        assert!(small.contains("unknown"));
        assert!(small.contains("Recent Errors"));
    }

    #[test]
    fn medium_layout_shows_logs_and_resources() {
        let aggregator = aggregator();
        aggregator.apply_health(
            "video-transcoder",
            Ok(HealthProbe {
                report: HealthReport::Up,
                latency: Duration::from_millis(42),
                message: None,
            }),
        );
        aggregator.apply_logs(
            "transcoder",
            vec![LogEntry::new(
                "transcoder",
                Utc::now(),
                "Job 17 finished",
                Severity::Success,
            )],
        );

        let mut app = App::with_theme(aggregator, Theme::dark());
        let text = render(&mut app, 100, 40);
        assert!(text.contains("Containers"));
        assert!(text.contains("Recent Logs"));
        assert!(text.contains("Job 17 finished"));
        assert!(text.contains("42ms"));
    }

    #[test]
    fn large_layout_groups_by_host_and_summarizes_errors() {
        let aggregator = aggregator();
        aggregator.apply_health(
            "account-manager",
            Err(ProbeError::Status(429)),
        );

        let mut app = App::with_theme(aggregator, Theme::dark());
        let text = render(&mut app, 160, 60);
        assert!(text.contains("db-box"));
        assert!(text.contains("Error Summary"));
        assert!(text.contains("rate-limit"));
    }

    #[test]
    fn large_layout_shows_hive_stats() {
        let aggregator = aggregator();
        let mut app = App::with_theme(aggregator.clone(), Theme::dark());
        assert!(render(&mut app, 160, 60).contains("loading"));

        aggregator.apply_hive_stats(Ok(HiveStats {
            subscribers: Some(12_345),
            ..HiveStats::default()
        }));
        let text = render(&mut app, 160, 60);
        assert!(text.contains("Hive Community"));
        assert!(text.contains("12,345"));
        assert!(text.contains("Data age"));

        assert!(!render(&mut app, 100, 40).contains("Hive Community"));
    }

    #[test]
    fn help_overlay_draws_on_top() {
        let mut app = App::with_theme(aggregator(), Theme::dark());
        app.show_help = true;
        let text = render(&mut app, 100, 40);
        assert!(text.contains("Keyboard Shortcuts"));
    }
}
