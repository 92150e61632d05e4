use regex::Regex;
use std::collections::HashSet;

use loglens_types::{LogEntry, LogLevel};

/// Compiled filter for log entries.
///
/// The pattern compiles as a regex; when that fails it degrades to a
/// literal substring match instead of surfacing the error, so a
/// half-typed pattern in a search box still narrows the view.
#[derive(Clone)]
pub struct CompiledFilter {
    /// Compiled pattern (if any); escaped literal in substring mode
    regex: Option<Regex>,

    /// Pattern text as given
    pattern: String,

    /// True when the pattern did not compile and is matched literally
    literal: bool,

    /// Levels allowed through; empty admits all
    levels: HashSet<LogLevel>,

    /// Whether to invert the text match
    invert: bool,

    /// Case-insensitive compilation was requested
    case_insensitive: bool,
}

impl CompiledFilter {
    /// Compile a filter from a pattern string
    pub fn new(pattern: &str) -> Self {
        Self::compile(pattern, false)
    }

    /// Compile a filter that matches case-insensitively
    pub fn new_case_insensitive(pattern: &str) -> Self {
        Self::compile(pattern, true)
    }

    fn compile(pattern: &str, case_insensitive: bool) -> Self {
        let prefix = if case_insensitive { "(?i)" } else { "" };
        let (regex, literal) = if pattern.is_empty() {
            (None, false)
        } else {
            match Regex::new(&format!("{prefix}{pattern}")) {
                Ok(re) => (Some(re), false),
                // Escaping guarantees a valid pattern
                Err(_) => (
                    Regex::new(&format!("{prefix}{}", regex::escape(pattern))).ok(),
                    true,
                ),
            }
        };

        Self {
            regex,
            pattern: pattern.to_string(),
            literal,
            levels: HashSet::new(),
            invert: false,
            case_insensitive,
        }
    }

    /// Restrict matching to the given levels
    pub fn with_levels(mut self, levels: HashSet<LogLevel>) -> Self {
        self.levels = levels;
        self
    }

    /// Invert the text match
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Whether an entry passes the level gate and the text match
    pub fn matches(&self, entry: &LogEntry) -> bool {
        // Level restriction applies regardless of inversion
        if !self.levels.is_empty() && !self.levels.contains(&entry.level) {
            return false;
        }

        let text_match = match &self.regex {
            Some(re) => re.is_match(&entry.message),
            None => true,
        };

        if self.invert { !text_match } else { text_match }
    }

    /// Byte spans of every match in `text`, for highlight rendering
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    /// The pattern as the user typed it
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True when nothing is restricted; such a filter passes everything
    pub fn is_empty(&self) -> bool {
        self.regex.is_none() && self.levels.is_empty() && !self.invert
    }

    /// True when a text pattern is active
    pub fn has_pattern(&self) -> bool {
        self.regex.is_some()
    }

    /// Check if the pattern fell back to literal substring matching
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// True for the case-insensitive variant
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("pattern", &self.pattern)
            .field("literal", &self.literal)
            .field("levels", &self.levels)
            .field("invert", &self.invert)
            .finish()
    }
}

/// Ready-made level restrictions
pub struct FilterPresets;

impl FilterPresets {
    /// Error and fatal entries only
    pub fn errors_only() -> CompiledFilter {
        let mut levels = HashSet::new();
        levels.insert(LogLevel::Error);
        levels.insert(LogLevel::Fatal);
        CompiledFilter::new("").with_levels(levels)
    }

    /// Warnings and worse
    pub fn warnings_and_above() -> CompiledFilter {
        let mut levels = HashSet::new();
        levels.insert(LogLevel::Warn);
        levels.insert(LogLevel::Error);
        levels.insert(LogLevel::Fatal);
        CompiledFilter::new("").with_levels(levels)
    }

    /// Info and above, hiding debug noise
    pub fn info_and_above() -> CompiledFilter {
        let mut levels = HashSet::new();
        levels.insert(LogLevel::Info);
        levels.insert(LogLevel::Warn);
        levels.insert(LogLevel::Error);
        levels.insert(LogLevel::Fatal);
        CompiledFilter::new("").with_levels(levels)
    }
}
