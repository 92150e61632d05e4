use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use loglens_types::{ArcLogEntry, LogEntry};

use crate::normalize::PatternNormalizer;

/// Tuning for error clustering
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ErrorGroupConfig {
    /// Fold a normalized stack prefix into the signature so distinct
    /// failure sites with the same message stay separate
    pub group_by_stack: bool,
    /// Stack lines contributing to the signature
    pub stack_prefix_lines: usize,
}

impl Default for ErrorGroupConfig {
    fn default() -> Self {
        Self {
            group_by_stack: true,
            stack_prefix_lines: 3,
        }
    }
}

/// A cluster of related failures
#[derive(Clone, Debug, Serialize)]
pub struct ErrorGroup {
    pub signature: String,
    /// Representative message with exception-name prefixes stripped
    pub message: String,
    pub count: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Distinct users affected, from entry metadata
    pub users: BTreeSet<String>,
    /// Distinct endpoints involved
    pub endpoints: BTreeSet<String>,
    /// Distinct services involved
    pub services: BTreeSet<String>,
}

static LINE_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\d+:\d+").expect("hardwired pattern"));

/// Leading "SomeError: " / "Exception: " prefixes on error messages
static EXCEPTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*(?:Error|Exception)\s*:\s*|^(?:Error|Exception|Panic)\s*:\s*")
        .expect("hardwired pattern")
});

const USER_KEYS: &[&str] = &["user", "user_id", "userId", "username"];
const ENDPOINT_KEYS: &[&str] = &["endpoint", "path", "route", "url"];
const SERVICE_KEYS: &[&str] = &["service", "service_name", "serviceName", "app"];

/// First metadata value found under any of the given keys
fn meta_value(entry: &LogEntry, keys: &[&str]) -> Option<String> {
    for key in keys {
        match entry.metadata.get(*key) {
            Some(serde_json::Value::String(s)) => return Some(s.clone()),
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Grouping key: normalized message, optionally extended with the first
/// few stack lines (line:col collapsed so rebuilds do not split groups)
fn error_signature(entry: &LogEntry, config: &ErrorGroupConfig) -> String {
    let mut signature = PatternNormalizer::signature(&entry.message);
    if config.group_by_stack {
        if let Some(stack) = entry.stack() {
            for line in stack.lines().take(config.stack_prefix_lines) {
                signature.push('|');
                signature.push_str(&LINE_COL.replace_all(line.trim(), ":{line}"));
            }
        }
    }
    signature
}

/// Strip leading exception-name prefixes, repeatedly for wrapped errors
fn clean_message(message: &str) -> String {
    let mut cleaned = message.trim().to_owned();
    loop {
        let stripped = EXCEPTION_PREFIX.replace(&cleaned, "");
        if stripped == cleaned {
            return cleaned;
        }
        cleaned = stripped.into_owned();
    }
}

/// Cluster error- and fatal-level entries by failure signature.
///
/// Lower-severity entries are ignored. Each cluster accumulates
/// occurrence bookkeeping plus the distinct users, endpoints, and
/// services seen in entry metadata. Output is sorted by count
/// descending.
pub fn group_errors(entries: &[ArcLogEntry], config: &ErrorGroupConfig) -> Vec<ErrorGroup> {
    let mut groups: HashMap<String, ErrorGroup> = HashMap::new();

    for entry in entries {
        if !entry.level.is_error() {
            continue;
        }
        let signature = error_signature(entry, config);
        let group = groups.entry(signature).or_insert_with_key(|signature| ErrorGroup {
            signature: signature.clone(),
            message: clean_message(&entry.message),
            count: 0,
            first_seen: entry.timestamp,
            last_seen: entry.timestamp,
            users: BTreeSet::new(),
            endpoints: BTreeSet::new(),
            services: BTreeSet::new(),
        });
        group.count += 1;
        group.first_seen = group.first_seen.min(entry.timestamp);
        group.last_seen = group.last_seen.max(entry.timestamp);
        if let Some(user) = meta_value(entry, USER_KEYS) {
            group.users.insert(user);
        }
        if let Some(endpoint) = meta_value(entry, ENDPOINT_KEYS) {
            group.endpoints.insert(endpoint);
        }
        if let Some(service) = meta_value(entry, SERVICE_KEYS) {
            group.services.insert(service);
        }
    }

    let mut groups: Vec<ErrorGroup> = groups.into_values().collect();
    groups.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.signature.cmp(&b.signature))
    });
    groups
}
