//! Stream ingestion for loglens
//!
//! This crate provides the ring buffer, admission control, rotation
//! detection, and the ingestor that wires them to a producer stream.

mod buffer;
mod limiter;
mod rotation;
mod stream;

pub use buffer::RingBuffer;
pub use limiter::RateLimiter;
pub use rotation::RotationDetector;
pub use stream::{IngestConfig, StreamIngestor};

// Re-export types used in our public API
pub use loglens_types::{ArcLogEntry, DropCounts, IngestStats, LogEntry, RawEntry};
