use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use loglens_types::{ArcLogEntry, LevelCounts};

use crate::normalize::PatternNormalizer;
use crate::patterns::LogPattern;

/// Span of the summarized entries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Point-in-time statistical summary of a set of entries; derived on
/// demand, never incrementally maintained
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatisticsSnapshot {
    pub total: usize,
    pub by_level: LevelCounts,
    /// None when the input was empty
    pub time_range: Option<TimeRange>,
    /// Share of entries at error or fatal level, in [0, 1]
    pub error_rate: f64,
    /// Entries per minute over the covered span (span floors at one
    /// minute so short bursts do not explode the average)
    pub avg_per_minute: f64,
    /// Most entries inside any sliding 60 s window
    pub peak_per_minute: usize,
    pub unique_messages: usize,
    /// Share of entries covered by the given patterns, in [0, 1]
    pub pattern_coverage: f64,
}

/// Summarize entries in a single pass plus one sort for the peak
/// window. Empty input yields the zero snapshot rather than an error.
pub fn compute_statistics(entries: &[ArcLogEntry], patterns: &[LogPattern]) -> StatisticsSnapshot {
    if entries.is_empty() {
        return StatisticsSnapshot::default();
    }

    let mut by_level = LevelCounts::default();
    let mut unique = HashSet::with_capacity(entries.len());
    let mut start = entries[0].timestamp;
    let mut end = entries[0].timestamp;
    for entry in entries {
        by_level.increment(entry.level);
        unique.insert(entry.message.as_str());
        start = start.min(entry.timestamp);
        end = end.max(entry.timestamp);
    }

    let total = entries.len();
    let duration_ms = (end - start).num_milliseconds();
    let duration_minutes = (duration_ms as f64 / 60_000.0).max(1.0);

    StatisticsSnapshot {
        total,
        by_level,
        time_range: Some(TimeRange {
            start,
            end,
            duration_ms,
        }),
        error_rate: by_level.errors() as f64 / total as f64,
        avg_per_minute: total as f64 / duration_minutes,
        peak_per_minute: peak_window(entries),
        unique_messages: unique.len(),
        pattern_coverage: coverage(entries, patterns),
    }
}

/// Two-pointer sweep over sorted timestamps
fn peak_window(entries: &[ArcLogEntry]) -> usize {
    let mut times: Vec<i64> = entries
        .iter()
        .map(|e| e.timestamp.timestamp_millis())
        .collect();
    times.sort_unstable();

    let mut peak = 0;
    let mut start = 0;
    for end in 0..times.len() {
        while times[end] - times[start] > 60_000 {
            start += 1;
        }
        peak = peak.max(end - start + 1);
    }
    peak
}

fn coverage(entries: &[ArcLogEntry], patterns: &[LogPattern]) -> f64 {
    if patterns.is_empty() {
        return 0.0;
    }
    let signatures: HashSet<&str> = patterns.iter().map(|p| p.signature.as_str()).collect();
    let covered = entries
        .iter()
        .filter(|e| signatures.contains(PatternNormalizer::signature(&e.message).as_str()))
        .count();
    covered as f64 / entries.len() as f64
}
