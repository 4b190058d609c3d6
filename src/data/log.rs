//! Log entries, severity classification and the per-source dedup window.

use std::collections::VecDeque;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;

/// Log severity. Ordering follows display precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warn,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "OK",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Whether entries at this severity go through the alert rules.
    pub fn is_problem(&self) -> bool {
        matches!(self, Severity::Warn | Severity::Error)
    }
}

fn pattern_set(patterns: &[&str]) -> RegexSet {
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
        .expect("severity patterns are valid")
}

static ERROR_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    pattern_set(&[
        r"\berrors?\b",
        r"\bfail(?:ed|ure|s)?\b",
        r"\bexception\b",
        r"\bfatal\b",
        r"\bcrash(?:ed)?\b",
        r"\btraceback\b",
        r"\bpanic(?:ked)?\b",
        r"❌",
    ])
});

static WARN_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    pattern_set(&[
        r"\bwarn(?:ing)?\b",
        r"\bretry(?:ing)?\b",
        r"\bdeprecated\b",
        r"\bslow\b",
        r"⚠",
    ])
});

static SUCCESS_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    pattern_set(&[
        r"\bsuccess(?:ful(?:ly)?)?\b",
        r"\bcompleted?\b",
        r"\bdone\b",
        r"\bfinished\b",
        r"\buploaded\b",
        r"✅",
    ])
});

/// Severity derived from a record's structured fields, before text matching.
pub fn structured_severity(success: Option<bool>, status: Option<&str>) -> Option<Severity> {
    if success == Some(false) {
        return Some(Severity::Error);
    }
    if let Some(status) = status {
        match status.trim().to_ascii_lowercase().as_str() {
            "failed" | "failure" | "error" => return Some(Severity::Error),
            "warning" | "warn" => return Some(Severity::Warn),
            "completed" | "complete" | "success" | "done" => return Some(Severity::Success),
            _ => {}
        }
    }
    if success == Some(true) {
        return Some(Severity::Success);
    }
    None
}

/// Classify a log line.
///
/// A structured hint wins when present; otherwise the highest-precedence
/// text pattern that matches decides, defaulting to INFO.
pub fn classify_severity(text: &str, hint: Option<Severity>) -> Severity {
    if let Some(hint) = hint {
        return hint;
    }
    if ERROR_PATTERNS.is_match(text) {
        Severity::Error
    } else if WARN_PATTERNS.is_match(text) {
        Severity::Warn
    } else if SUCCESS_PATTERNS.is_match(text) {
        Severity::Success
    } else {
        Severity::Info
    }
}

/// Dedup key: source id plus trimmed, whitespace-collapsed, lowercased text.
pub fn dedup_key(source: &str, text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    format!("{source}\u{1f}{normalized}")
}

/// One (possibly repeated) log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub severity: Severity,
    #[serde(skip)]
    pub key: String,
    pub repeats: u32,
}

impl LogEntry {
    pub fn new(
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
        text: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let source = source.into();
        let text = text.into();
        let key = dedup_key(&source, &text);
        Self {
            source,
            timestamp,
            text,
            severity,
            key,
            repeats: 1,
        }
    }
}

/// What [`LogWindow::push`] did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Appended,
    /// An existing entry absorbed the line; carries its new repeat count.
    Repeated(u32),
}

/// Bounded, deduplicated window of a single source's recent log lines.
///
/// Keys are unique within the window: a line matching an older entry
/// moves that entry to the end instead of adding a second copy.
#[derive(Debug, Clone, Serialize)]
pub struct LogWindow {
    entries: VecDeque<LogEntry>,
    #[serde(skip)]
    capacity: usize,
}

impl LogWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, mut entry: LogEntry) -> PushOutcome {
        if let Some(last) = self.entries.back_mut() {
            if last.key == entry.key {
                last.repeats = last.repeats.saturating_add(1);
                if entry.timestamp > last.timestamp {
                    last.timestamp = entry.timestamp;
                }
                last.severity = last.severity.max(entry.severity);
                return PushOutcome::Repeated(last.repeats);
            }
        }

        if let Some(pos) = self.entries.iter().position(|e| e.key == entry.key) {
            if let Some(older) = self.entries.remove(pos) {
                entry.repeats = older.repeats.saturating_add(1);
                entry.severity = entry.severity.max(older.severity);
                if older.timestamp > entry.timestamp {
                    entry.timestamp = older.timestamp;
                }
                let repeats = entry.repeats;
                self.entries.push_back(entry);
                return PushOutcome::Repeated(repeats);
            }
        }

        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        PushOutcome::Appended
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}
