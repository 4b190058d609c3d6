//! Service health panels.
//!
//! Three densities of the same data: a name/status list for small
//! terminals, a detailed table with latency trend, and the detailed table
//! grouped under one header row per host.

use std::collections::BTreeMap;

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Cell, Row, Table},
    Frame,
};

use super::{ago, panel_block};
use crate::aggregator::DashboardSnapshot;
use crate::app::App;
use crate::data::duration::format_duration;
use crate::data::{HealthStatus, ServiceTarget};
use crate::layout::Panel;

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
/// Samples shown in the trend column.
const SPARKLINE_WIDTH: usize = 12;

pub fn render_compact(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let header = Row::new(vec!["Service", "Status", "Latency"])
        .height(1)
        .style(app.theme.header);

    let rows: Vec<Row> = snapshot
        .services
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.name.clone()),
                Cell::from(s.status.label()).style(app.theme.status_style(s.status)),
                Cell::from(latency(s)),
            ])
        })
        .collect();

    let widths = [Constraint::Fill(3), Constraint::Length(9), Constraint::Length(9)];
    let table = Table::new(rows, widths)
        .header(header)
        .block(panel_block(app, title(Panel::ServiceHealthCompact, snapshot)));

    frame.render_widget(table, area);
}

pub fn render_detailed(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let rows: Vec<Row> = snapshot
        .services
        .iter()
        .map(|s| detailed_row(app, snapshot, s, ""))
        .collect();

    frame.render_widget(
        detailed_table(app, rows, title(Panel::ServiceHealthDetailed, snapshot)),
        area,
    );
}

pub fn render_per_host(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let mut by_host: BTreeMap<&str, Vec<&ServiceTarget>> = BTreeMap::new();
    for service in &snapshot.services {
        by_host.entry(service.host.as_str()).or_default().push(service);
    }

    let mut rows = Vec::new();
    for (host, services) in by_host {
        let worst = services
            .iter()
            .map(|s| s.status)
            .max()
            .unwrap_or(HealthStatus::Unknown);
        rows.push(Row::new(vec![
            Cell::from(Span::styled(
                host.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Cell::from(format!("{} svc", services.len())),
            Cell::from(""),
            Cell::from(""),
            Cell::from(worst.symbol()).style(app.theme.status_style(worst)),
            Cell::from(""),
            Cell::from(""),
        ]));
        rows.extend(services.into_iter().map(|s| detailed_row(app, snapshot, s, "  ")));
    }

    frame.render_widget(
        detailed_table(app, rows, title(Panel::ServiceHealthPerHost, snapshot)),
        area,
    );
}

fn detailed_table<'a>(app: &App, rows: Vec<Row<'a>>, title: String) -> Table<'a> {
    let header = Row::new(vec!["Service", "Status", "Latency", "Trend", "Last OK", "Uptime", "Detail"])
        .height(1)
        .style(app.theme.header);

    let widths = [
        Constraint::Fill(2),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(SPARKLINE_WIDTH as u16),
        Constraint::Length(10),
        Constraint::Length(14),
        Constraint::Fill(3),
    ];

    Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(panel_block(app, title))
}

fn detailed_row<'a>(
    app: &App,
    snapshot: &DashboardSnapshot,
    service: &ServiceTarget,
    indent: &str,
) -> Row<'a> {
    let detail = if !service.issues.is_empty() {
        service
            .issues
            .iter()
            .map(|i| i.describe())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        service.last_error.clone().unwrap_or_else(|| "-".to_string())
    };
    let detail_style = match service.status {
        HealthStatus::Up => app.theme.muted,
        status => app.theme.status_style(status),
    };

    Row::new(vec![
        Cell::from(format!("{}{}", indent, service.name)),
        Cell::from(service.status.label()).style(app.theme.status_style(service.status)),
        Cell::from(latency(service)),
        Cell::from(render_sparkline(&snapshot.latency_history.sparkline(&service.name))),
        Cell::from(
            ago(service.last_success)
                .trim_end_matches(" ago")
                .to_string(),
        ),
        Cell::from(uptime(snapshot, service)).style(app.theme.muted),
        Cell::from(detail).style(detail_style),
    ])
}

/// Uptime of the service's container, when it has one and it is up.
fn uptime(snapshot: &DashboardSnapshot, service: &ServiceTarget) -> String {
    service
        .container
        .as_ref()
        .and_then(|c| snapshot.resources.get(c))
        .map(super::resources::uptime)
        .unwrap_or_else(|| "-".to_string())
}

fn title(panel: Panel, snapshot: &DashboardSnapshot) -> String {
    format!(
        "{} ({}/{} up)",
        panel.title(),
        snapshot.count_by_status(HealthStatus::Up),
        snapshot.services.len()
    )
}

fn latency(service: &ServiceTarget) -> String {
    match (service.status, service.latency) {
        (HealthStatus::Down, _) | (_, None) => "-".to_string(),
        (_, Some(d)) => format_duration(d),
    }
}

fn render_sparkline(data: &[u8]) -> String {
    if data.is_empty() {
        return "-".to_string();
    }

    data.iter()
        .rev()
        .take(SPARKLINE_WIDTH)
        .rev()
        .map(|&v| match v {
            0 => '·',
            v => SPARKLINE_CHARS[(v as usize).min(7)],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_comes_from_linked_container() {
        use chrono::Utc;

        use crate::data::{ResourceSample, RunState};

        let service = ServiceTarget::new(
            "video-transcoder",
            "http://localhost:8081",
            "http://localhost:8081/healthz",
            "localhost",
            std::time::Duration::from_secs(10),
            std::time::Duration::from_secs(5),
        );
        let mut snapshot = DashboardSnapshot::default();
        assert_eq!(uptime(&snapshot, &service), "-");

        let service = service.with_container("video-worker");
        let mut sample = ResourceSample::bare("video-worker", RunState::Running, Utc::now());
        sample.uptime = Some("3 days".into());
        snapshot.resources.insert("video-worker".into(), sample);
        assert_eq!(uptime(&snapshot, &service), "3 days");
    }

    #[test]
    fn sparkline_marks_gaps_and_keeps_latest() {
        assert_eq!(render_sparkline(&[]), "-");
        assert_eq!(render_sparkline(&[1, 0, 7]), "▂·█");

        let long: Vec<u8> = (0..20).map(|i| (i % 7 + 1) as u8).collect();
        assert_eq!(render_sparkline(&long).chars().count(), SPARKLINE_WIDTH);
    }
}
