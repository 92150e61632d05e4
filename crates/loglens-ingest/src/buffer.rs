use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use loglens_types::ArcLogEntry;

/// Thread-safe fixed-capacity ring buffer for log entries.
///
/// Overwrite order is strictly FIFO by physical slot, tracked by a write
/// cursor. Timestamps play no part in eviction, so entries that arrive
/// out of order still age out in arrival order.
#[derive(Clone)]
pub struct RingBuffer {
    /// Slot storage plus write cursor - uses Arc<LogEntry> so reads are
    /// refcount bumps, not entry clones
    inner: Arc<RwLock<RingState>>,

    /// Fast atomic mirror of the slot count (len() without the lock)
    len: Arc<AtomicUsize>,

    /// Entries overwritten while full, since creation or last clear()
    dropped: Arc<AtomicU64>,

    /// Maximum capacity
    capacity: usize,
}

struct RingState {
    slots: Vec<ArcLogEntry>,
    /// Oldest slot once full; next write position
    cursor: usize,
}

impl RingState {
    /// Write one entry, overwriting the oldest slot when full.
    /// Returns true when an existing entry was evicted.
    fn write(&mut self, entry: ArcLogEntry, capacity: usize) -> bool {
        if self.slots.len() < capacity {
            self.slots.push(entry);
            return false;
        }
        let cursor = self.cursor;
        self.slots[cursor] = entry;
        self.cursor = (cursor + 1) % capacity;
        true
    }
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(RingState {
                slots: Vec::with_capacity(capacity),
                cursor: 0,
            })),
            len: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Append one entry. Returns true when an old entry was overwritten.
    pub fn append(&self, entry: ArcLogEntry) -> bool {
        let mut state = self.inner.write();
        let evicted = state.write(entry, self.capacity);
        if evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.len.store(state.slots.len(), Ordering::Relaxed);
        }
        evicted
    }

    /// Append a batch under a single write lock.
    /// Returns how many appends did not overwrite an old entry.
    pub fn append_batch<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = ArcLogEntry>,
    {
        let mut state = self.inner.write();
        let mut appended = 0;
        for entry in entries {
            if state.write(entry, self.capacity) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            } else {
                appended += 1;
            }
        }
        self.len.store(state.slots.len(), Ordering::Relaxed);
        appended
    }

    /// All retained entries in insertion order, regardless of wraparound.
    /// Arc clones are cheap - just reference count increments.
    pub fn all(&self) -> Vec<ArcLogEntry> {
        let state = self.inner.read();
        if state.slots.len() < self.capacity || state.cursor == 0 {
            return state.slots.clone();
        }
        let mut out = Vec::with_capacity(state.slots.len());
        out.extend_from_slice(&state.slots[state.cursor..]);
        out.extend_from_slice(&state.slots[..state.cursor]);
        out
    }

    /// The last `k` entries in insertion order
    pub fn tail(&self, k: usize) -> Vec<ArcLogEntry> {
        let mut all = self.all();
        let start = all.len().saturating_sub(k);
        all.split_off(start)
    }

    /// Drop every retained entry and reset the cursor and drop counter
    pub fn clear(&self) {
        let mut state = self.inner.write();
        state.slots.clear();
        state.cursor = 0;
        self.len.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }

    /// Retained entry count (lock-free via atomic counter)
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Check if buffer is empty (lock-free)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries lost to overwriting since creation or last clear()
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Fill ratio in [0, 1]
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }
}
