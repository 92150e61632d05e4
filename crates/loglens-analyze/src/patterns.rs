use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loglens_types::{ArcLogEntry, LogLevel};

use crate::normalize::PatternNormalizer;

/// How widely a recurring message matters, from the worst level seen
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Rough functional area a pattern belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternCategory {
    Error,
    Performance,
    Security,
    Business,
    System,
}

/// A recurring message shape
#[derive(Clone, Debug, Serialize)]
pub struct LogPattern {
    /// Normalized grouping key
    pub signature: String,
    /// Display form with uppercase placeholder tokens
    pub template: String,
    pub count: usize,
    pub severity: PatternSeverity,
    pub category: PatternCategory,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Most recent raw messages, oldest trimmed first
    pub examples: Vec<String>,
}

/// Tuning for pattern extraction
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Signatures seen fewer times than this are noise
    pub min_occurrences: usize,
    /// Upper bound on returned patterns
    pub max_patterns: usize,
    /// Raw examples kept per pattern
    pub max_examples: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            max_patterns: 100,
            max_examples: 10,
        }
    }
}

const ERROR_WORDS: &[&str] = &["error", "exception", "fail", "fatal", "panic", "crash"];
const PERFORMANCE_WORDS: &[&str] = &["timeout", "slow", "latency", "deadline", "throttl"];
const SECURITY_WORDS: &[&str] = &[
    "auth",
    "login",
    "permission",
    "denied",
    "unauthorized",
    "forbidden",
    "credential",
];
const BUSINESS_WORDS: &[&str] = &["user", "order", "payment", "checkout", "invoice", "account"];

/// Keyword tables checked in priority order; first hit wins
fn categorize(signature: &str) -> PatternCategory {
    let lower = signature.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(ERROR_WORDS) {
        PatternCategory::Error
    } else if has(PERFORMANCE_WORDS) {
        PatternCategory::Performance
    } else if has(SECURITY_WORDS) {
        PatternCategory::Security
    } else if has(BUSINESS_WORDS) {
        PatternCategory::Business
    } else {
        PatternCategory::System
    }
}

fn severity_for(level: LogLevel) -> PatternSeverity {
    match level {
        LogLevel::Fatal => PatternSeverity::Critical,
        LogLevel::Error => PatternSeverity::High,
        LogLevel::Warn => PatternSeverity::Medium,
        LogLevel::Trace | LogLevel::Debug | LogLevel::Info => PatternSeverity::Low,
    }
}

/// Group entries by normalized signature and keep the shapes that recur.
///
/// Groups below `min_occurrences` are discarded; the rest are sorted by
/// count descending (signature as tie-break, so output is deterministic)
/// and capped at `max_patterns`.
pub fn extract_patterns(entries: &[ArcLogEntry], config: &PatternConfig) -> Vec<LogPattern> {
    let mut groups: HashMap<String, LogPattern> = HashMap::new();

    for entry in entries {
        let signature = PatternNormalizer::signature(&entry.message);
        let group = groups.entry(signature).or_insert_with_key(|signature| LogPattern {
            signature: signature.clone(),
            template: PatternNormalizer::template(&entry.message),
            count: 0,
            severity: severity_for(entry.level),
            category: categorize(signature),
            first_seen: entry.timestamp,
            last_seen: entry.timestamp,
            examples: Vec::new(),
        });
        group.count += 1;
        group.severity = group.severity.max(severity_for(entry.level));
        group.first_seen = group.first_seen.min(entry.timestamp);
        group.last_seen = group.last_seen.max(entry.timestamp);
        group.examples.push(entry.message.clone());
        if group.examples.len() > config.max_examples {
            group.examples.remove(0);
        }
    }

    let mut patterns: Vec<LogPattern> = groups
        .into_values()
        .filter(|p| p.count >= config.min_occurrences)
        .collect();
    patterns.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.signature.cmp(&b.signature))
    });
    patterns.truncate(config.max_patterns);
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn entry(ms: i64, level: LogLevel, message: &str) -> ArcLogEntry {
        Arc::new(loglens_types::LogEntry {
            timestamp: DateTime::from_timestamp_millis(ms).unwrap(),
            level,
            message: message.into(),
            metadata: HashMap::new(),
            error: None,
        })
    }

    #[test]
    fn test_groups_messages_differing_only_in_variables() {
        let entries = vec![
            entry(0, LogLevel::Warn, "Database timeout for user 123"),
            entry(1_000, LogLevel::Warn, "Database timeout for user 456"),
        ];
        let config = PatternConfig {
            min_occurrences: 2,
            ..PatternConfig::default()
        };
        let patterns = extract_patterns(&entries, &config);
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.count, 2);
        assert_eq!(pattern.template, "Database timeout for user <NUMBER>");
        assert_eq!(pattern.signature, "Database timeout for user {number}");
        assert_eq!(pattern.category, PatternCategory::Performance);
    }

    #[test]
    fn test_min_occurrences_filters_noise() {
        let mut entries = Vec::new();
        for n in 0..5 {
            entries.push(entry(n, LogLevel::Info, "cache hit for key 42"));
        }
        entries.push(entry(100, LogLevel::Info, "one-off startup banner"));
        let patterns = extract_patterns(&entries, &PatternConfig::default());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].count, 5);
    }

    #[test]
    fn test_sorted_by_count_and_capped() {
        let mut entries = Vec::new();
        for n in 0..10 {
            entries.push(entry(n, LogLevel::Info, "frequent event 1"));
        }
        for n in 0..5 {
            entries.push(entry(n, LogLevel::Info, "less frequent event 2"));
        }
        for n in 0..3 {
            entries.push(entry(n, LogLevel::Info, "rare event 3"));
        }
        let patterns = extract_patterns(&entries, &PatternConfig::default());
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[0].count, 10);
        assert_eq!(patterns[1].count, 5);
        assert_eq!(patterns[2].count, 3);

        let capped = extract_patterns(
            &entries,
            &PatternConfig {
                max_patterns: 2,
                ..PatternConfig::default()
            },
        );
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].count, 10);
    }

    #[test]
    fn test_severity_is_worst_level_seen() {
        let entries = vec![
            entry(0, LogLevel::Info, "worker 1 heartbeat"),
            entry(1, LogLevel::Warn, "worker 2 heartbeat"),
            entry(2, LogLevel::Fatal, "worker 3 heartbeat"),
        ];
        let patterns = extract_patterns(&entries, &PatternConfig::default());
        assert_eq!(patterns[0].severity, PatternSeverity::Critical);
    }

    #[test]
    fn test_category_priority_order() {
        // "timeout" and "user" both present; error words win over both
        assert_eq!(
            categorize("error: user request timeout"),
            PatternCategory::Error
        );
        assert_eq!(
            categorize("user request timeout"),
            PatternCategory::Performance
        );
        assert_eq!(categorize("user login denied"), PatternCategory::Security);
        assert_eq!(categorize("user checkout complete"), PatternCategory::Business);
        assert_eq!(categorize("listening on port {number}"), PatternCategory::System);
    }

    #[test]
    fn test_examples_keep_most_recent() {
        let mut entries = Vec::new();
        for n in 0..12 {
            entries.push(entry(n, LogLevel::Info, &format!("tick {n}")));
        }
        let patterns = extract_patterns(&entries, &PatternConfig::default());
        let examples = &patterns[0].examples;
        assert_eq!(examples.len(), 10);
        assert_eq!(examples.first().unwrap(), "tick 2");
        assert_eq!(examples.last().unwrap(), "tick 11");
    }

    #[test]
    fn test_first_and_last_seen_span_the_group() {
        let entries = vec![
            entry(5_000, LogLevel::Info, "poll 1"),
            entry(1_000, LogLevel::Info, "poll 2"),
            entry(9_000, LogLevel::Info, "poll 3"),
        ];
        let patterns = extract_patterns(&entries, &PatternConfig::default());
        let pattern = &patterns[0];
        assert_eq!(pattern.first_seen, DateTime::from_timestamp_millis(1_000).unwrap());
        assert_eq!(pattern.last_seen, DateTime::from_timestamp_millis(9_000).unwrap());
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_patterns(&[], &PatternConfig::default()).is_empty());
    }
}
