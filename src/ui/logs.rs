//! Log panels: one merged stream, or one pane per source.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

use super::panel_block;
use crate::aggregator::{DashboardSnapshot, LogSourceState};
use crate::app::App;
use crate::data::LogEntry;
use crate::layout::Panel;

/// Newest entries from every source, newest first.
pub fn render_recent(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let entries = snapshot.recent_logs(visible);
    let block = panel_block(app, Panel::RecentLogs.title());

    if entries.is_empty() {
        let paragraph = Paragraph::new(Span::styled(" no log lines yet", app.theme.muted)).block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = entries
        .into_iter()
        .map(|entry| ListItem::new(entry_line(app, entry, true)))
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

/// One pane per configured log source, splitting the area evenly.
pub fn render_per_source(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    if snapshot.logs.is_empty() {
        let paragraph = Paragraph::new(Span::styled(" no log sources configured", app.theme.muted))
            .block(panel_block(app, Panel::PerSourceLogs.title()));
        frame.render_widget(paragraph, area);
        return;
    }

    let panes = Layout::vertical(vec![Constraint::Fill(1); snapshot.logs.len()]).split(area);
    for ((id, source), pane) in snapshot.logs.iter().zip(panes.iter()) {
        render_source(frame, app, id, source, *pane);
    }
}

fn render_source(frame: &mut Frame, app: &App, id: &str, source: &LogSourceState, area: Rect) {
    let mut title = format!("{}: {}", Panel::PerSourceLogs.title(), id);
    if let Some(service) = &source.service {
        title.push_str(&format!(" ({})", service));
    }
    let block = panel_block(app, title);

    let visible = area.height.saturating_sub(2) as usize;
    let mut items: Vec<ListItem> = Vec::new();
    if let Some(err) = &source.last_error {
        items.push(ListItem::new(Line::from(Span::styled(
            format!(" fetch failed: {}", err),
            app.theme.severity_style(crate::data::Severity::Warn),
        ))));
    }
    items.extend(
        source
            .window
            .iter()
            .rev()
            .take(visible.saturating_sub(items.len()))
            .map(|entry| ListItem::new(entry_line(app, entry, false))),
    );

    if items.is_empty() {
        let paragraph = Paragraph::new(Span::styled(" no log lines yet", app.theme.muted)).block(block);
        frame.render_widget(paragraph, area);
        return;
    }
    frame.render_widget(List::new(items).block(block), area);
}

fn entry_line(app: &App, entry: &LogEntry, with_source: bool) -> Line<'static> {
    let style = app.theme.severity_style(entry.severity);
    let mut spans = vec![
        Span::styled(
            format!(" {} ", entry.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S")),
            app.theme.muted,
        ),
        Span::styled(format!("{:<5} ", entry.severity.label()), style),
    ];
    if with_source {
        spans.push(Span::styled(format!("[{}] ", entry.source), app.theme.muted));
    }
    spans.push(Span::styled(entry.text.clone(), style));
    if entry.repeats > 1 {
        spans.push(Span::styled(format!(" (x{})", entry.repeats), app.theme.header));
    }
    Line::from(spans)
}
