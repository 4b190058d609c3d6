//! Hive community statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stats younger than this many minutes are fresh.
const FRESH_MINUTES: i64 = 5;
/// Stats older than this many minutes are stale.
const STALE_MINUTES: i64 = 15;

/// Community totals as reported by the stats API.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HiveStats {
    pub subscribers: Option<u64>,
    pub posts: Option<u64>,
    pub comments: Option<u64>,
    /// Distinct post authors over the last 30 days.
    pub active_authors: Option<u64>,
    /// Distinct commenters over the last 30 days.
    pub active_commenters: Option<u64>,
    pub payouts_hbd: Option<f64>,
}

/// How current the last successful fetch is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Aging,
    Stale,
}

impl Freshness {
    pub fn of(age: chrono::Duration) -> Self {
        let minutes = age.num_minutes();
        if minutes < FRESH_MINUTES {
            Freshness::Fresh
        } else if minutes < STALE_MINUTES {
            Freshness::Aging
        } else {
            Freshness::Stale
        }
    }
}

/// Last known stats plus fetch bookkeeping.
///
/// A failed fetch keeps the previous stats on screen and only records the
/// error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HiveStatsState {
    pub stats: Option<HiveStats>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl HiveStatsState {
    pub fn record(&mut self, stats: HiveStats, at: DateTime<Utc>) {
        self.stats = Some(stats);
        self.fetched_at = Some(at);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    /// Freshness of the held stats, `None` before the first success.
    pub fn freshness(&self, now: DateTime<Utc>) -> Option<Freshness> {
        self.fetched_at.map(|at| Freshness::of(now - at))
    }
}
