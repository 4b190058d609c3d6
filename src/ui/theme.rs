//! Theme configuration for the dashboard.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::{Connectivity, HealthStatus, RunState, Severity};

/// Color and style theme for the dashboard.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for titles and status messages.
    pub highlight: Color,
    /// Color for degraded services and warnings.
    pub warning: Color,
    /// Color for down services and errors.
    pub critical: Color,
    /// Color for healthy services and successes.
    pub healthy: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for values that have no data behind them yet.
    pub muted: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a health status
    pub fn status_style(&self, status: HealthStatus) -> Style {
        match status {
            HealthStatus::Unknown => self.muted,
            HealthStatus::Up => Style::default().fg(self.healthy),
            HealthStatus::Degraded => Style::default().fg(self.warning),
            HealthStatus::Down => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
        }
    }

    pub fn severity_style(&self, severity: Severity) -> Style {
        match severity {
            Severity::Info => Style::default(),
            Severity::Success => Style::default().fg(self.healthy),
            Severity::Warn => Style::default().fg(self.warning),
            Severity::Error => Style::default().fg(self.critical),
        }
    }

    pub fn connectivity_style(&self, connectivity: Connectivity) -> Style {
        match connectivity {
            Connectivity::Unknown => self.muted,
            Connectivity::Online => Style::default().fg(self.healthy),
            Connectivity::Offline => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    pub fn run_state_style(&self, state: RunState) -> Style {
        match state {
            RunState::Running => Style::default().fg(self.healthy),
            RunState::Restarting => Style::default().fg(self.warning),
            RunState::Stopped | RunState::Missing => Style::default().fg(self.critical),
            RunState::Unknown => self.muted,
        }
    }

    /// Style for a percentage measured against its high-water mark.
    pub fn usage_style(&self, percent: Option<f64>, high_water: f64) -> Style {
        match percent {
            Some(p) if p >= high_water => Style::default().fg(self.critical),
            Some(p) if p >= high_water * 0.8 => Style::default().fg(self.warning),
            Some(_) => Style::default(),
            None => self.muted,
        }
    }
}
