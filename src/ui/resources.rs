//! Container resource panel.

use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Cell, Row, Table},
    Frame,
};

use super::panel_block;
use crate::aggregator::DashboardSnapshot;
use crate::app::App;
use crate::data::resource::format_bytes;
use crate::data::ResourceSample;
use crate::layout::Panel;

pub fn render(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let marks = app.high_water();
    let header = Row::new(vec!["Container", "State", "Uptime", "CPU", "Memory", "Mem %"])
        .height(1)
        .style(app.theme.header);

    let rows: Vec<Row> = if snapshot.resources.is_empty() {
        vec![Row::new(vec![
            Cell::from("no data yet").style(app.theme.muted),
            Cell::from("unknown").style(app.theme.muted),
            Cell::from("-"),
            Cell::from("-"),
            Cell::from("-"),
            Cell::from("-"),
        ])]
    } else {
        snapshot
            .resources
            .values()
            .map(|sample| {
                let memory_percent = sample.memory_ratio();
                Row::new(vec![
                    Cell::from(sample.container.clone()),
                    Cell::from(sample.run_state.label())
                        .style(app.theme.run_state_style(sample.run_state)),
                    Cell::from(uptime(sample)).style(app.theme.muted),
                    Cell::from(percent(sample.cpu_percent))
                        .style(app.theme.usage_style(sample.cpu_percent, marks.cpu_percent)),
                    Cell::from(memory(sample)),
                    Cell::from(percent(memory_percent))
                        .style(app.theme.usage_style(memory_percent, marks.memory_percent)),
                ])
            })
            .collect()
    };

    let widths = [
        Constraint::Fill(2),
        Constraint::Length(10),
        Constraint::Length(14),
        Constraint::Length(7),
        Constraint::Fill(2),
        Constraint::Length(7),
    ];

    let running = snapshot
        .resources
        .values()
        .filter(|s| s.run_state == crate::data::RunState::Running)
        .count();
    let title = format!(
        "{} ({}/{} running)",
        Panel::Resources.title(),
        running,
        snapshot.resources.len()
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(panel_block(app, title));
    frame.render_widget(table, area);
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v))
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn uptime(sample: &ResourceSample) -> String {
    sample.uptime.clone().unwrap_or_else(|| "-".to_string())
}

fn memory(sample: &ResourceSample) -> String {
    match (sample.memory_used, sample.memory_limit) {
        (Some(used), Some(limit)) => format!("{} / {}", format_bytes(used), format_bytes(limit)),
        (Some(used), None) => format_bytes(used),
        _ => "-".to_string(),
    }
}
