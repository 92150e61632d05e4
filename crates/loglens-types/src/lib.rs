//! Shared types for loglens
//!
//! This crate contains data structures used across multiple loglens crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Log Levels
// ============================================================================

/// Log severity level, ordered from least to most severe
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Parse a log level from common spellings. Returns `None` for
    /// unrecognized text; the caller decides whether that makes the
    /// surrounding entry malformed.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" | "trc" | "trce" => Some(Self::Trace),
            "debug" | "dbg" | "debg" => Some(Self::Debug),
            "info" | "inf" | "information" => Some(Self::Info),
            "warn" | "warning" | "wrn" => Some(Self::Warn),
            "error" | "err" | "erro" => Some(Self::Error),
            "fatal" | "panic" | "critical" | "crit" | "ftl" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Short display string (3 chars)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRC",
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Warn => "WRN",
            Self::Error => "ERR",
            Self::Fatal => "FTL",
        }
    }

    /// Whether this level represents a failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Fatal)
    }
}

// ============================================================================
// Log Entries
// ============================================================================

/// Structured error payload attached to a log entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A producer-shaped candidate entry, before validation.
///
/// Every field is optional: transports hand over whatever they managed to
/// decode and [`LogEntry::from_raw`] decides whether it is usable. Field
/// aliases cover the common JSON log dialects; unrecognized fields are
/// collected into `metadata`. Timestamps must be RFC 3339 strings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default, alias = "time", alias = "ts", alias = "@timestamp")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, alias = "lvl", alias = "severity")]
    pub level: Option<String>,

    #[serde(default, alias = "msg", alias = "log", alias = "text", alias = "body")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,

    #[serde(flatten)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RawEntry {
    /// Candidate carrying only a message, e.g. an undecodable raw line
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Why a candidate entry was rejected at the ingestion boundary.
///
/// Malformed entries are droppable, never fatal: the ingestor counts them
/// and moves on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MalformedEntry {
    #[error("entry is missing a timestamp")]
    MissingTimestamp,
    #[error("entry is missing a level")]
    MissingLevel,
    #[error("unrecognized level {0:?}")]
    UnknownLevel(String),
    #[error("entry has no message")]
    MissingMessage,
}

/// A validated, immutable log entry.
///
/// Constructed only through [`LogEntry::from_raw`]; once buffered it is
/// shared as [`ArcLogEntry`] and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Buffered entries are shared by pointer; cloning is a refcount bump
pub type ArcLogEntry = Arc<LogEntry>;

impl LogEntry {
    /// Validate a candidate into an entry. A missing or empty message,
    /// a missing timestamp, or an unparseable level rejects the whole
    /// candidate.
    pub fn from_raw(raw: RawEntry) -> Result<Self, MalformedEntry> {
        let timestamp = raw.timestamp.ok_or(MalformedEntry::MissingTimestamp)?;
        let level_text = raw.level.ok_or(MalformedEntry::MissingLevel)?;
        let level =
            LogLevel::parse(&level_text).ok_or(MalformedEntry::UnknownLevel(level_text))?;
        let message = match raw.message {
            Some(m) if !m.trim().is_empty() => m,
            _ => return Err(MalformedEntry::MissingMessage),
        };
        Ok(Self {
            timestamp,
            level,
            message,
            metadata: raw.metadata,
            error: raw.error,
        })
    }

    /// Stack trace attached to this entry, if any
    pub fn stack(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.stack.as_deref())
    }
}

// ============================================================================
// Ingestion Counters
// ============================================================================

/// Entry counts per log level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub trace: usize,
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
}

impl LevelCounts {
    pub fn increment(&mut self, level: LogLevel) {
        match level {
            LogLevel::Trace => self.trace += 1,
            LogLevel::Debug => self.debug += 1,
            LogLevel::Info => self.info += 1,
            LogLevel::Warn => self.warn += 1,
            LogLevel::Error => self.error += 1,
            LogLevel::Fatal => self.fatal += 1,
        }
    }

    pub fn get(&self, level: LogLevel) -> usize {
        match level {
            LogLevel::Trace => self.trace,
            LogLevel::Debug => self.debug,
            LogLevel::Info => self.info,
            LogLevel::Warn => self.warn,
            LogLevel::Error => self.error,
            LogLevel::Fatal => self.fatal,
        }
    }

    pub fn total(&self) -> usize {
        self.trace + self.debug + self.info + self.warn + self.error + self.fatal
    }

    /// Combined error and fatal count
    pub fn errors(&self) -> usize {
        self.error + self.fatal
    }
}

/// Entries lost during ingestion, by cause.
///
/// Admission drops (rate limit, memory ceiling) and malformed rejections
/// happen before buffering. Overwrite drops are ring evictions and are
/// accounted separately: an overwritten entry was admitted and visible to
/// consumers before it aged out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub rate_limited: u64,
    pub memory_pressure: u64,
    pub malformed: u64,
    pub overwritten: u64,
}

impl DropCounts {
    pub fn total(&self) -> u64 {
        self.rate_limited + self.memory_pressure + self.malformed + self.overwritten
    }
}

/// Immutable snapshot of one stream's ingestion counters
#[derive(Clone, Copy, Debug, Serialize)]
pub struct IngestStats {
    /// Entries accepted into the buffer since the stream started
    pub total_ingested: u64,
    /// Admissions observed in the trailing one-second window
    pub logs_per_second: usize,
    /// Estimated buffer memory (entry count times a per-entry constant)
    pub estimated_memory_bytes: u64,
    pub dropped: DropCounts,
    /// Source rotations detected so far
    pub rotations: u64,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    /// Buffer fill ratio in [0, 1]
    pub utilization: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_level_parse_aliases() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("information"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("panic"), Some(LogLevel::Fatal));
        assert_eq!(LogLevel::parse(" err "), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(LogLevel::parse(""), None);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
        assert!(LogLevel::Fatal.is_error());
        assert!(!LogLevel::Warn.is_error());
    }

    #[test]
    fn test_from_raw_accepts_complete_entry() {
        let raw = RawEntry {
            timestamp: Some(ts(1_000)),
            level: Some("info".into()),
            message: Some("server started".into()),
            ..RawEntry::default()
        };
        let entry = LogEntry::from_raw(raw).unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "server started");
        assert_eq!(entry.timestamp, ts(1_000));
    }

    #[test]
    fn test_from_raw_rejects_incomplete_entries() {
        let complete = || RawEntry {
            timestamp: Some(ts(0)),
            level: Some("info".into()),
            message: Some("ok".into()),
            ..RawEntry::default()
        };

        let mut raw = complete();
        raw.timestamp = None;
        assert_eq!(LogEntry::from_raw(raw), Err(MalformedEntry::MissingTimestamp));

        let mut raw = complete();
        raw.level = None;
        assert_eq!(LogEntry::from_raw(raw), Err(MalformedEntry::MissingLevel));

        let mut raw = complete();
        raw.level = Some("loud".into());
        assert_eq!(
            LogEntry::from_raw(raw),
            Err(MalformedEntry::UnknownLevel("loud".into()))
        );

        let mut raw = complete();
        raw.message = Some("   ".into());
        assert_eq!(LogEntry::from_raw(raw), Err(MalformedEntry::MissingMessage));

        let mut raw = complete();
        raw.message = None;
        assert_eq!(LogEntry::from_raw(raw), Err(MalformedEntry::MissingMessage));
    }

    #[test]
    fn test_raw_entry_field_aliases() {
        let raw: RawEntry = serde_json::from_str(
            r#"{"ts":"2024-01-15T10:30:00Z","severity":"warn","msg":"disk nearly full","host":"web-1"}"#,
        )
        .unwrap();
        assert!(raw.timestamp.is_some());
        assert_eq!(raw.level.as_deref(), Some("warn"));
        assert_eq!(raw.message.as_deref(), Some("disk nearly full"));
        assert_eq!(
            raw.metadata.get("host"),
            Some(&serde_json::Value::String("web-1".into()))
        );
    }

    #[test]
    fn test_raw_entry_error_payload() {
        let raw: RawEntry = serde_json::from_str(
            r#"{"timestamp":"2024-01-15T10:30:00Z","level":"error","message":"boom","error":{"name":"TypeError","message":"x is undefined","stack":"at handler (app.js:10:5)"}}"#,
        )
        .unwrap();
        let entry = LogEntry::from_raw(raw).unwrap();
        assert_eq!(entry.error.as_ref().unwrap().name, "TypeError");
        assert_eq!(entry.stack(), Some("at handler (app.js:10:5)"));
    }

    #[test]
    fn test_level_counts() {
        let mut counts = LevelCounts::default();
        counts.increment(LogLevel::Info);
        counts.increment(LogLevel::Info);
        counts.increment(LogLevel::Error);
        counts.increment(LogLevel::Fatal);
        assert_eq!(counts.get(LogLevel::Info), 2);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.errors(), 2);
    }

    #[test]
    fn test_drop_counts_total() {
        let dropped = DropCounts {
            rate_limited: 5,
            memory_pressure: 1,
            malformed: 2,
            overwritten: 10,
        };
        assert_eq!(dropped.total(), 18);
    }
}
