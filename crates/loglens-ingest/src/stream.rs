use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use loglens_types::{ArcLogEntry, DropCounts, IngestStats, LogEntry, RawEntry};

use crate::buffer::RingBuffer;
use crate::limiter::RateLimiter;
use crate::rotation::RotationDetector;

/// Tuning for one ingestion stream
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Ring buffer capacity in entries
    pub buffer_capacity: usize,

    /// Admission cap for the trailing one-second window
    pub max_events_per_second: usize,

    /// When false the limiter only observes; nothing is rate-dropped
    pub backpressure: bool,

    /// Estimated-memory ceiling for the buffer
    pub max_memory_bytes: u64,

    /// Per-entry cost used for the memory estimate. A constant on
    /// purpose: measuring real entry sizes would put serialization on
    /// the hot path.
    pub avg_entry_bytes: u64,

    /// Cadence of the logs-per-second refresher
    pub stats_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 10_000,
            max_events_per_second: 1_000,
            backpressure: true,
            max_memory_bytes: 64 * 1024 * 1024,
            avg_entry_bytes: 512,
            stats_interval_ms: 1_000,
        }
    }
}

/// Counters shared between the ingest loop and stats() polls.
/// All atomic; nothing holds a lock while reading them.
#[derive(Default)]
struct IngestCounters {
    total_ingested: AtomicU64,
    rate_limited: AtomicU64,
    memory_pressure: AtomicU64,
    malformed: AtomicU64,
    rotations: AtomicU64,
}

impl IngestCounters {
    fn reset(&self) {
        self.total_ingested.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
        self.memory_pressure.store(0, Ordering::Relaxed);
        self.malformed.store(0, Ordering::Relaxed);
        self.rotations.store(0, Ordering::Relaxed);
    }
}

/// Drives one producer stream through validation, rotation detection,
/// admission control, and the ring buffer.
///
/// Entries are processed strictly in arrival order. The accepted-batch
/// callback passed to [`connect`](Self::connect) is the only path by
/// which new data reaches downstream consumers. Independent streams get
/// independent ingestors; nothing here is process-global.
#[derive(Clone)]
pub struct StreamIngestor {
    config: IngestConfig,
    buffer: RingBuffer,
    limiter: RateLimiter,
    rotation: Arc<Mutex<RotationDetector>>,
    counters: Arc<IngestCounters>,
    cancel: CancellationToken,
}

impl StreamIngestor {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            buffer: RingBuffer::new(config.buffer_capacity),
            limiter: RateLimiter::new(config.max_events_per_second),
            rotation: Arc::new(Mutex::new(RotationDetector::new())),
            counters: Arc::new(IngestCounters::default()),
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// The retained entries, for downstream projection
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Consume a producer stream of entry batches until it ends, fails,
    /// or [`shutdown`](Self::shutdown) is called.
    ///
    /// `on_accepted` runs after each batch with the entries that made it
    /// into the buffer, in arrival order. Producer failures propagate to
    /// the caller, which owns reconnect policy. Malformed entries are
    /// counted and skipped, never fatal.
    pub async fn connect<S, F>(&self, mut stream: S, mut on_accepted: F) -> Result<()>
    where
        S: Stream<Item = Result<Vec<RawEntry>>> + Unpin,
        F: FnMut(&[ArcLogEntry]),
    {
        let refresher = self.spawn_rate_refresher();

        let result = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break Ok(()),

                batch = stream.next() => {
                    match batch {
                        Some(Ok(batch)) => {
                            let accepted = self.ingest_batch(batch);
                            if !accepted.is_empty() {
                                on_accepted(&accepted);
                            }
                        }
                        Some(Err(err)) => {
                            // Producer failed; reconnecting is the caller's call
                            break Err(err);
                        }
                        None => {
                            // Stream ended normally
                            break Ok(());
                        }
                    }
                }
            }
        };

        refresher.abort();
        result
    }

    /// Run one producer batch through the pipeline. Returns the accepted
    /// entries in arrival order.
    fn ingest_batch(&self, batch: Vec<RawEntry>) -> Vec<ArcLogEntry> {
        let mut accepted = Vec::with_capacity(batch.len());

        for raw in batch {
            let entry = match LogEntry::from_raw(raw) {
                Ok(entry) => Arc::new(entry),
                Err(err) => {
                    self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %err, "dropping malformed entry");
                    continue;
                }
            };

            let rotated = {
                let mut rotation = self.rotation.lock();
                let rotated = rotation.observe(&entry);
                if rotated {
                    rotation.reset();
                }
                rotated
            };
            if rotated {
                self.counters.rotations.fetch_add(1, Ordering::Relaxed);
                warn!("timestamp regression run looks like a source rotation, clearing buffer");
                self.buffer.clear();
            }

            if self.config.backpressure {
                if self.limiter.should_drop() {
                    self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            } else {
                self.limiter.record();
            }

            if self.estimated_memory_bytes() >= self.config.max_memory_bytes {
                self.counters.memory_pressure.fetch_add(1, Ordering::Relaxed);
                debug!("memory ceiling reached, dropping entry");
                continue;
            }

            self.buffer.append(Arc::clone(&entry));
            self.counters.total_ingested.fetch_add(1, Ordering::Relaxed);
            accepted.push(entry);
        }

        accepted
    }

    /// Periodically recompute the trailing rate so its cached reading
    /// decays to zero while the stream is quiet
    fn spawn_rate_refresher(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.limiter.clone();
        let cancel = self.cancel.clone();
        let period = Duration::from_millis(self.config.stats_interval_ms.max(1));

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        limiter.rate();
                    }
                }
            }
        })
    }

    fn estimated_memory_bytes(&self) -> u64 {
        self.buffer.len() as u64 * self.config.avg_entry_bytes
    }

    /// Immutable snapshot of the stream's counters; safe to poll from
    /// any task at any cadence
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            total_ingested: self.counters.total_ingested.load(Ordering::Relaxed),
            logs_per_second: self.limiter.rate(),
            estimated_memory_bytes: self.estimated_memory_bytes(),
            dropped: DropCounts {
                rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
                memory_pressure: self.counters.memory_pressure.load(Ordering::Relaxed),
                malformed: self.counters.malformed.load(Ordering::Relaxed),
                overwritten: self.buffer.dropped_count(),
            },
            rotations: self.counters.rotations.load(Ordering::Relaxed),
            buffer_len: self.buffer.len(),
            buffer_capacity: self.buffer.capacity(),
            utilization: self.buffer.utilization(),
        }
    }

    /// Reset buffer, limiter, rotation state, and every counter
    pub fn clear(&self) {
        let mut rotation = self.rotation.lock();
        self.buffer.clear();
        self.limiter.reset();
        rotation.reset();
        self.counters.reset();
    }

    /// Stop consuming the producer and release the stats refresher.
    /// Entries already delivered through the accepted-batch callback are
    /// unaffected.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
