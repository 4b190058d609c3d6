//! Error detection: alert categories, text rules and the event ledger.
//!
//! Every recurring problem is tracked as one [`ErrorEvent`] per
//! (source, category). Repeat matches update the existing event instead of
//! creating a new one; events resolve after a streak of healthy signals
//! from their source, or once nothing has matched them for a quiet period.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// How many resolved events stay visible after resolution.
const MAX_RESOLVED: usize = 20;

/// Alert categories recognized by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    RateLimit,
    AuthFailure,
    Timeout,
    CookieExpiry,
    ResourceInsufficiency,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 5] = [
        ErrorCategory::RateLimit,
        ErrorCategory::AuthFailure,
        ErrorCategory::Timeout,
        ErrorCategory::CookieExpiry,
        ErrorCategory::ResourceInsufficiency,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "rate-limit",
            ErrorCategory::AuthFailure => "auth-failure",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::CookieExpiry => "cookie-expiry",
            ErrorCategory::ResourceInsufficiency => "resources",
        }
    }
}

struct TextRule {
    category: ErrorCategory,
    pattern: Regex,
}

fn rule(category: ErrorCategory, pattern: &str) -> TextRule {
    TextRule {
        category,
        pattern: RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("alert rule patterns are valid"),
    }
}

static TEXT_RULES: LazyLock<Vec<TextRule>> = LazyLock::new(|| {
    vec![
        rule(
            ErrorCategory::RateLimit,
            r"rate[ _-]?limit|too many requests|\b429\b|please wait a few minutes",
        ),
        rule(
            ErrorCategory::CookieExpiry,
            r"cookies?\W+(?:are\s+|is\s+)?(?:expired|invalid|missing)|(?:invalid|expired|missing)\s+cookies?|cookies_valid\W+false|session\s+expired",
        ),
        rule(
            ErrorCategory::AuthFailure,
            r"unauthori[sz]ed|forbidden|\b40[13]\b|login required|authentication (?:failed|error|failure)|invalid credentials|not authenticated",
        ),
        rule(
            ErrorCategory::Timeout,
            r"timed?[ _-]?out|deadline exceeded",
        ),
        rule(
            ErrorCategory::ResourceInsufficiency,
            r"out of memory|\boom\b|no space left|disk full|cannot allocate|resources? (?:exhausted|insufficient)|insufficient (?:memory|resources|storage)",
        ),
    ]
});

/// Return every alert category whose rule matches `text`, without duplicates.
pub fn categorize(text: &str) -> Vec<ErrorCategory> {
    TEXT_RULES
        .iter()
        .filter(|r| r.pattern.is_match(text))
        .map(|r| r.category)
        .collect()
}

/// Whether an event is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EventState {
    Active,
    Resolved {
        at: DateTime<Utc>,
        reason: Resolution,
    },
}

/// Why an event was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    HealthyStreak,
    QuietPeriod,
}

/// A deduplicated, counted record of a recurring problem.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub category: ErrorCategory,
    pub source: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrences: u64,
    pub state: EventState,
    /// Text of the most recent match.
    pub detail: String,
}

impl ErrorEvent {
    pub fn is_active(&self) -> bool {
        self.state == EventState::Active
    }
}

/// Rules for closing events.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionPolicy {
    /// Consecutive healthy signals from a source that resolve its events.
    pub healthy_cycles: u32,
    /// Time without a repeat match after which an event resolves.
    pub quiet_period: Duration,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            healthy_cycles: 3,
            quiet_period: Duration::from_secs(600),
        }
    }
}

/// Store of active and recently resolved error events.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorLedger {
    active: Vec<ErrorEvent>,
    resolved: VecDeque<ErrorEvent>,
    #[serde(skip)]
    healthy_streaks: HashMap<String, u32>,
    #[serde(skip)]
    policy: ResolutionPolicy,
}

impl ErrorLedger {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Record a match of `category` from `source`.
    ///
    /// Returns `true` if this opened a new event.
    pub fn record(
        &mut self,
        source: &str,
        category: ErrorCategory,
        detail: &str,
        at: DateTime<Utc>,
    ) -> bool {
        self.healthy_streaks.insert(source.to_string(), 0);

        if let Some(event) = self
            .active
            .iter_mut()
            .find(|e| e.source == source && e.category == category)
        {
            event.occurrences += 1;
            if at > event.last_seen {
                event.last_seen = at;
            }
            event.detail = detail.to_string();
            return false;
        }

        self.active.push(ErrorEvent {
            category,
            source: source.to_string(),
            first_seen: at,
            last_seen: at,
            occurrences: 1,
            state: EventState::Active,
            detail: detail.to_string(),
        });
        true
    }

    /// Record a healthy signal from `source`.
    ///
    /// Returns the number of events this resolved.
    pub fn healthy(&mut self, source: &str, at: DateTime<Utc>) -> usize {
        let streak = self.healthy_streaks.entry(source.to_string()).or_insert(0);
        *streak = streak.saturating_add(1);
        if *streak < self.policy.healthy_cycles.max(1) {
            return 0;
        }
        self.resolve_where(|e| e.source == source, at, Resolution::HealthyStreak)
    }

    /// Break a source's healthy streak without recording a match.
    pub fn unhealthy(&mut self, source: &str) {
        self.healthy_streaks.insert(source.to_string(), 0);
    }

    /// Resolve events that have not matched for the quiet period.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let quiet = chrono::Duration::from_std(self.policy.quiet_period)
            .unwrap_or(chrono::Duration::MAX);
        self.resolve_where(|e| now - e.last_seen >= quiet, now, Resolution::QuietPeriod)
    }

    fn resolve_where<F>(&mut self, mut pred: F, at: DateTime<Utc>, reason: Resolution) -> usize
    where
        F: FnMut(&ErrorEvent) -> bool,
    {
        let (closing, keep): (Vec<_>, Vec<_>) = self.active.drain(..).partition(|e| pred(e));
        self.active = keep;

        let count = closing.len();
        for mut event in closing {
            event.state = EventState::Resolved { at, reason };
            self.resolved.push_front(event);
        }
        self.resolved.truncate(MAX_RESOLVED);
        count
    }

    /// Active events, most recently seen first.
    pub fn active(&self) -> Vec<&ErrorEvent> {
        let mut events: Vec<&ErrorEvent> = self.active.iter().collect();
        events.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        events
    }

    /// Recently resolved events, newest resolution first.
    pub fn resolved(&self) -> impl Iterator<Item = &ErrorEvent> {
        self.resolved.iter()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active event count per category.
    pub fn count_by_category(&self, category: ErrorCategory) -> usize {
        self.active.iter().filter(|e| e.category == category).count()
    }

    /// Total occurrences recorded against active events of a category.
    pub fn occurrences_by_category(&self, category: ErrorCategory) -> u64 {
        self.active
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.occurrences)
            .sum()
    }

    /// Look up the active event for a source and category.
    pub fn find_active(&self, source: &str, category: ErrorCategory) -> Option<&ErrorEvent> {
        self.active
            .iter()
            .find(|e| e.source == source && e.category == category)
    }
}
