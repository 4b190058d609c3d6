//! Terminal-size-adaptive panel selection.
//!
//! | Height        | Variant | Panels                                                        |
//! |---------------|---------|---------------------------------------------------------------|
//! | < 30          | Small   | internet, service health (compact), recent errors             |
//! | 30 ..= 49     | Medium  | internet, service health (detailed), resources, recent logs   |
//! | >= 50         | Large   | internet, health per host, resources, hive stats, logs per    |
//! |               |         | source, errors                                                |
//!
//! Width only decides whether panels are stacked or laid out in two columns.

use serde::Serialize;

/// Rows at which the layout grows from SMALL to MEDIUM.
pub const MEDIUM_MIN_HEIGHT: u16 = 30;
/// Rows at which the layout grows from MEDIUM to LARGE.
pub const LARGE_MIN_HEIGHT: u16 = 50;
/// Columns needed for a two-column arrangement.
pub const TWO_COLUMN_MIN_WIDTH: u16 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutVariant {
    Small,
    Medium,
    Large,
}

impl LayoutVariant {
    pub fn label(&self) -> &'static str {
        match self {
            LayoutVariant::Small => "small",
            LayoutVariant::Medium => "medium",
            LayoutVariant::Large => "large",
        }
    }
}

/// Dashboard panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Internet,
    ServiceHealthCompact,
    ServiceHealthDetailed,
    ServiceHealthPerHost,
    Resources,
    HiveStats,
    RecentLogs,
    PerSourceLogs,
    RecentErrors,
    ErrorSummary,
}

impl Panel {
    pub fn title(&self) -> &'static str {
        match self {
            Panel::Internet => "Internet",
            Panel::ServiceHealthCompact | Panel::ServiceHealthDetailed => "Services",
            Panel::ServiceHealthPerHost => "Services by Host",
            Panel::Resources => "Containers",
            Panel::HiveStats => "Hive Community",
            Panel::RecentLogs => "Recent Logs",
            Panel::PerSourceLogs => "Logs",
            Panel::RecentErrors => "Recent Errors",
            Panel::ErrorSummary => "Error Summary",
        }
    }
}

/// The panels to draw and how to arrange them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardLayout {
    pub variant: LayoutVariant,
    pub panels: Vec<Panel>,
    /// 1 or 2.
    pub columns: u16,
}

/// Pick the layout for a terminal of `width` x `height` cells.
///
/// Total: every size maps to a layout, the tiniest ones to SMALL.
///
/// # Example
///
/// ```
/// use fleetwatch::layout::{select, LayoutVariant, Panel};
///
/// let layout = select(80, 24);
/// assert_eq!(layout.variant, LayoutVariant::Small);
/// assert_eq!(layout.panels[0], Panel::Internet);
/// ```
pub fn select(width: u16, height: u16) -> DashboardLayout {
    let variant = if height >= LARGE_MIN_HEIGHT {
        LayoutVariant::Large
    } else if height >= MEDIUM_MIN_HEIGHT {
        LayoutVariant::Medium
    } else {
        LayoutVariant::Small
    };

    let panels = match variant {
        LayoutVariant::Small => vec![
            Panel::Internet,
            Panel::ServiceHealthCompact,
            Panel::RecentErrors,
        ],
        LayoutVariant::Medium => vec![
            Panel::Internet,
            Panel::ServiceHealthDetailed,
            Panel::Resources,
            Panel::RecentLogs,
        ],
        LayoutVariant::Large => vec![
            Panel::Internet,
            Panel::ServiceHealthPerHost,
            Panel::Resources,
            Panel::HiveStats,
            Panel::PerSourceLogs,
            Panel::ErrorSummary,
        ],
    };

    let columns = if variant != LayoutVariant::Small && width >= TWO_COLUMN_MIN_WIDTH {
        2
    } else {
        1
    };

    DashboardLayout {
        variant,
        panels,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_boundaries() {
        assert_eq!(select(100, 29).variant, LayoutVariant::Small);
        assert_eq!(select(100, 30).variant, LayoutVariant::Medium);
        assert_eq!(select(100, 49).variant, LayoutVariant::Medium);
        assert_eq!(select(100, 50).variant, LayoutVariant::Large);
    }

    #[test]
    fn panel_sets() {
        assert_eq!(
            select(80, 20).panels,
            vec![Panel::Internet, Panel::ServiceHealthCompact, Panel::RecentErrors]
        );
        assert_eq!(
            select(80, 40).panels,
            vec![
                Panel::Internet,
                Panel::ServiceHealthDetailed,
                Panel::Resources,
                Panel::RecentLogs
            ]
        );
        assert_eq!(select(80, 60).panels.len(), 6);
        assert!(select(80, 60).panels.contains(&Panel::ErrorSummary));
        assert!(select(80, 60).panels.contains(&Panel::HiveStats));
        assert!(!select(80, 40).panels.contains(&Panel::HiveStats));
    }

    #[test]
    fn tiny_terminals_degrade_to_small() {
        assert_eq!(select(0, 0).variant, LayoutVariant::Small);
        assert_eq!(select(10, 3).variant, LayoutVariant::Small);
    }

    #[test]
    fn width_only_changes_columns() {
        let narrow = select(119, 60);
        let wide = select(120, 60);
        assert_eq!(narrow.panels, wide.panels);
        assert_eq!(narrow.columns, 1);
        assert_eq!(wide.columns, 2);
        assert_eq!(select(200, 20).columns, 1);
    }
}
