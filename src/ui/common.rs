//! Common UI components shared across layouts.
//!
//! This module contains the header bar, status bar, and help overlay.

use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::ago;
use crate::aggregator::DashboardSnapshot;
use crate::app::App;
use crate::data::HealthStatus;

/// Render the header bar with the fleet overview.
///
/// Displays: overall indicator, service counts by status, active errors,
/// connectivity, and the wall clock.
pub fn render_header(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let up = snapshot.count_by_status(HealthStatus::Up);
    let degraded = snapshot.count_by_status(HealthStatus::Degraded);
    let down = snapshot.count_by_status(HealthStatus::Down);
    let unknown = snapshot.count_by_status(HealthStatus::Unknown);
    let active_errors = snapshot.errors.active_count();

    // Overall status indicator
    let overall = if down > 0 {
        HealthStatus::Down
    } else if degraded > 0 || active_errors > 0 {
        HealthStatus::Degraded
    } else if up > 0 {
        HealthStatus::Up
    } else {
        HealthStatus::Unknown
    };

    let count = |n: usize, status: HealthStatus| {
        if n > 0 {
            Span::styled(n.to_string(), app.theme.status_style(status))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        }
    };

    let line = Line::from(vec![
        Span::styled(" ● ", app.theme.status_style(overall)),
        Span::styled("FLEETWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        count(up, HealthStatus::Up),
        Span::raw(" up "),
        count(degraded, HealthStatus::Degraded),
        Span::raw(" degraded "),
        count(down, HealthStatus::Down),
        Span::raw(" down "),
        count(unknown, HealthStatus::Unknown),
        Span::raw(" unknown │ "),
        if active_errors > 0 {
            Span::styled(
                format!("{} errors", active_errors),
                Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled("0 errors", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" │ net "),
        Span::styled(
            snapshot.network.connectivity.label(),
            app.theme.connectivity_style(snapshot.network.connectivity),
        ),
        Span::raw(format!(" │ {}", Local::now().format("%H:%M:%S"))),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar at the bottom.
///
/// Shows a temporary status message when one is set, otherwise the time
/// since the last update, the layout in use and the available keys.
pub fn render_status_bar(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let updated = match snapshot.updated_at {
        Some(_) => format!("Updated {}", ago(snapshot.updated_at)),
        None => "Waiting for first poll".to_string(),
    };
    let (width, height) = snapshot.terminal;
    let status = format!(
        " {} | {} {}x{} | ?:help e:export q:quit",
        updated,
        app.layout.variant.label(),
        width,
        height
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the dashboard.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from("  ?           Toggle this help"),
        Line::from("  e           Export snapshot to JSON"),
        Line::from("  q / Esc     Quit"),
        Line::from("  Ctrl-C      Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Layout",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  < 30 rows   small"),
        Line::from("  30-49 rows  medium"),
        Line::from("  50+ rows    large"),
        Line::from("  120+ cols   two columns"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 16u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    // Clear the area behind the help
    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
