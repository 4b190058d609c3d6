//! Hive community stats panel.

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    widgets::{Cell, Row, Table},
    Frame,
};

use super::{ago, panel_block};
use crate::aggregator::DashboardSnapshot;
use crate::app::App;
use crate::data::{Freshness, HiveStats};
use crate::layout::Panel;

/// Metric rows plus the data age row.
pub const ROWS: usize = 7;

pub fn render(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let state = &snapshot.hive_stats;
    let header = Row::new(vec!["Metric", "Value"])
        .height(1)
        .style(app.theme.header);

    let mut rows: Vec<Row> = match &state.stats {
        Some(stats) => metric_rows(stats),
        None => match &state.last_error {
            Some(err) => vec![
                Row::new(vec![
                    Cell::from("Status"),
                    Cell::from("API failed").style(Style::default().fg(app.theme.critical)),
                ]),
                Row::new(vec![Cell::from("Details"), Cell::from(err.clone())])
                    .style(app.theme.muted),
            ],
            None => vec![Row::new(vec![
                Cell::from("Status"),
                Cell::from("loading").style(app.theme.muted),
            ])],
        },
    };

    if let Some(freshness) = state.freshness(Utc::now()) {
        let color = match freshness {
            Freshness::Fresh => app.theme.healthy,
            Freshness::Aging => app.theme.warning,
            Freshness::Stale => app.theme.critical,
        };
        let mut age = ago(state.fetched_at);
        if state.last_error.is_some() {
            age.push_str(" (refresh failed)");
        }
        rows.push(Row::new(vec![
            Cell::from("Data age"),
            Cell::from(age).style(Style::default().fg(color)),
        ]));
    }

    let table = Table::new(rows, [Constraint::Length(16), Constraint::Fill(1)])
        .header(header)
        .block(panel_block(app, Panel::HiveStats.title()));
    frame.render_widget(table, area);
}

fn metric_rows(stats: &HiveStats) -> Vec<Row<'static>> {
    let payouts = stats
        .payouts_hbd
        .map(|v| format!("{} HBD", format_count(v.round() as u64)))
        .unwrap_or_else(|| "-".to_string());

    [
        ("Subscribers", count(stats.subscribers)),
        ("Posts", count(stats.posts)),
        ("Comments", count(stats.comments)),
        ("Active authors", count(stats.active_authors)),
        ("Active users", count(stats.active_commenters)),
        ("Total payouts", payouts),
    ]
    .into_iter()
    .map(|(metric, value)| Row::new(vec![Cell::from(metric), Cell::from(value)]))
    .collect()
}

fn count(value: Option<u64>) -> String {
    value.map(format_count).unwrap_or_else(|| "-".to_string())
}

/// Group digits in thousands: 1234567 -> "1,234,567".
fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_grouped() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(count(None), "-");
    }

    #[test]
    fn every_metric_has_a_row() {
        let rows = metric_rows(&HiveStats::default());
        assert_eq!(rows.len() + 1, ROWS);
    }
}
