//! Internet connectivity panel.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{ago, panel_block};
use crate::aggregator::DashboardSnapshot;
use crate::app::App;
use crate::data::duration::format_duration;
use crate::data::{Connectivity, SpeedTestResult, Throughput};
use crate::layout::Panel;

pub fn render(frame: &mut Frame, app: &App, snapshot: &DashboardSnapshot, area: Rect) {
    let net = &snapshot.network;

    let mut status = vec![
        Span::raw(" Connectivity: "),
        Span::styled(
            net.connectivity.label().to_uppercase(),
            app.theme.connectivity_style(net.connectivity),
        ),
        Span::raw(format!(
            "   latency {}   checked {}",
            net.latency.map(format_duration).unwrap_or_else(|| "-".to_string()),
            ago(net.checked_at)
        )),
    ];
    if net.connectivity == Connectivity::Offline {
        if let Some(err) = &net.last_error {
            status.push(Span::styled(
                format!("   {}", err),
                app.theme.connectivity_style(Connectivity::Offline),
            ));
        }
    }

    let mut speed = vec![Span::raw(" Speed:        ")];
    match &net.throughput {
        Throughput::Pending => speed.push(Span::styled("not measured yet", app.theme.muted)),
        Throughput::Running { since, previous } => {
            speed.push(Span::raw(
                previous.as_ref().map(format_speed).unwrap_or_else(|| "-".to_string()),
            ));
            speed.push(Span::styled(
                format!("   testing (started {})", ago(Some(*since))),
                app.theme.muted,
            ));
        }
        Throughput::Measured { result, at } => {
            speed.push(Span::raw(format_speed(result)));
            speed.push(Span::styled(
                format!("   measured {}", ago(Some(*at))),
                app.theme.muted,
            ));
        }
        Throughput::Unknown { reason } => {
            speed.push(Span::raw("unknown"));
            speed.push(Span::styled(format!("   {}", reason), app.theme.muted));
        }
    }

    let paragraph = Paragraph::new(vec![Line::from(status), Line::from(speed)])
        .block(panel_block(app, Panel::Internet.title()));
    frame.render_widget(paragraph, area);
}

fn format_speed(result: &SpeedTestResult) -> String {
    format!(
        "↓ {:.1} Mbps   ↑ {:.1} Mbps   ping {:.0} ms",
        result.download_mbps, result.upload_mbps, result.ping_ms
    )
}
