//! Error event panels.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, List, ListItem, Row, Table},
    Frame,
};

use super::{ago, panel_block};
use crate::aggregator::DashboardSnapshot;
use crate::app::App;
use crate::data::{ErrorCategory, ErrorEvent, EventState};
use crate::layout::Panel;

/// Active events newest first, followed by recently resolved ones.
pub fn render_recent(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let title = format!(
        "{} ({} active)",
        Panel::RecentErrors.title(),
        snapshot.errors.active_count()
    );
    frame.render_widget(event_list(app, snapshot, title), area);
}

/// Per-category counts above the event list.
pub fn render_summary(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(ErrorCategory::ALL.len() as u16 + 3),
        Constraint::Min(0),
    ])
    .split(area);

    let header = Row::new(vec!["Category", "Active", "Occurrences"])
        .height(1)
        .style(app.theme.header);
    let rows: Vec<Row> = ErrorCategory::ALL
        .iter()
        .map(|category| {
            let active = snapshot.errors.count_by_category(*category);
            let style = if active > 0 {
                Style::default().fg(app.theme.critical)
            } else {
                app.theme.muted
            };
            Row::new(vec![
                Cell::from(category.label()),
                Cell::from(active.to_string()),
                Cell::from(snapshot.errors.occurrences_by_category(*category).to_string()),
            ])
            .style(style)
        })
        .collect();
    let table = Table::new(
        rows,
        [Constraint::Fill(2), Constraint::Length(8), Constraint::Length(12)],
    )
    .header(header)
    .block(panel_block(app, Panel::ErrorSummary.title()));
    frame.render_widget(table, chunks[0]);

    let title = format!("Events ({} active)", snapshot.errors.active_count());
    frame.render_widget(event_list(app, snapshot, title), chunks[1]);
}

fn event_list(app: &App, snapshot: &DashboardSnapshot, title: String) -> List<'static> {
    let mut items: Vec<ListItem> = snapshot
        .errors
        .active()
        .into_iter()
        .map(|event| ListItem::new(event_line(app, event)))
        .collect();
    items.extend(
        snapshot
            .errors
            .resolved()
            .map(|event| ListItem::new(event_line(app, event))),
    );

    if items.is_empty() {
        items.push(ListItem::new(Span::styled(" no errors", app.theme.muted)));
    }

    List::new(items).block(panel_block(app, title))
}

fn event_line(app: &App, event: &ErrorEvent) -> Line<'static> {
    match &event.state {
        EventState::Active => {
            let style = Style::default().fg(app.theme.critical);
            let mut spans = vec![
                Span::styled(
                    format!(" {:<13} ", event.category.label()),
                    style.add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{} ", event.source)),
            ];
            if event.occurrences > 1 {
                spans.push(Span::styled(format!("x{} ", event.occurrences), style));
            }
            spans.push(Span::styled(
                format!("{} ", ago(Some(event.last_seen))),
                app.theme.muted,
            ));
            spans.push(Span::raw(event.detail.clone()));
            Line::from(spans)
        }
        EventState::Resolved { at, .. } => Line::from(Span::styled(
            format!(
                " {:<13} {} resolved {}",
                event.category.label(),
                event.source,
                ago(Some(*at))
            ),
            app.theme.muted,
        )),
    }
}
