//! Log analysis for loglens
//!
//! This crate provides pattern clustering, error grouping, and
//! statistical summaries over a snapshot of buffered entries.

mod errors;
mod normalize;
mod patterns;
mod stats;

pub use errors::{ErrorGroup, ErrorGroupConfig, group_errors};
pub use normalize::PatternNormalizer;
pub use patterns::{
    LogPattern, PatternCategory, PatternConfig, PatternSeverity, extract_patterns,
};
pub use stats::{StatisticsSnapshot, TimeRange, compute_statistics};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export types used in our public API
pub use loglens_types::{ArcLogEntry, LevelCounts, LogEntry, LogLevel};

/// Everything one analysis pass produces
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisSnapshot {
    pub patterns: Vec<LogPattern>,
    pub error_groups: Vec<ErrorGroup>,
    pub statistics: StatisticsSnapshot,
    pub generated_at: DateTime<Utc>,
}

/// Tuning for a full analysis pass
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    pub patterns: PatternConfig,
    pub errors: ErrorGroupConfig,
}

/// Analysis facade over one consistent snapshot of entries.
///
/// A pass reads the entries it is given and returns derived aggregates
/// only; nothing raw is retained between passes, so passes over live
/// buffers never block ingestion.
#[derive(Clone, Debug, Default)]
pub struct Analyzer {
    config: AnalyzeConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzeConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, entries: &[ArcLogEntry]) -> AnalysisSnapshot {
        let patterns = extract_patterns(entries, &self.config.patterns);
        let error_groups = group_errors(entries, &self.config.errors);
        let statistics = compute_statistics(entries, &patterns);
        AnalysisSnapshot {
            patterns,
            error_groups,
            statistics,
            generated_at: Utc::now(),
        }
    }
}
