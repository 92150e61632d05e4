//! View-layer math for loglens
//!
//! This crate provides virtual-scrolling geometry and entry filtering
//! for whatever frontend renders the buffered logs. It holds no log
//! state of its own.

mod filter;
mod viewport;

pub use filter::{CompiledFilter, FilterPresets};
pub use viewport::{ViewportCalculator, ViewportWindow};

// Re-export types used in our public API
pub use loglens_types::{LogEntry, LogLevel};
