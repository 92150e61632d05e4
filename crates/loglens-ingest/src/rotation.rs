use chrono::{DateTime, Utc};

use loglens_types::LogEntry;

/// A regression only counts when the entry is this much older than the
/// last accepted timestamp
const BACKWARD_JUMP_MS: i64 = 1_000;

/// Consecutive regressions required to confirm a rotation
const JUMPS_TO_CONFIRM: u32 = 5;

/// Detects source discontinuities (file truncation, process restart)
/// from timestamp behavior alone; log streams carry no explicit
/// rotation signal.
///
/// A single out-of-order entry is tolerated. Only an unbroken run of
/// large backward jumps reads as a rotation, trading a few entries of
/// detection latency for a low false-positive rate. The reference
/// timestamp holds still through a regression run so the run is measured
/// against the same point.
#[derive(Debug, Default)]
pub struct RotationDetector {
    last_seen: Option<DateTime<Utc>>,
    backward_jumps: u32,
}

impl RotationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next entry in arrival order. Returns true when this
    /// entry confirms a rotation; the caller is expected to clear its
    /// buffer and reset this detector before continuing.
    pub fn observe(&mut self, entry: &LogEntry) -> bool {
        let Some(last_seen) = self.last_seen else {
            self.last_seen = Some(entry.timestamp);
            return false;
        };

        let regressed =
            (last_seen - entry.timestamp).num_milliseconds() > BACKWARD_JUMP_MS;
        if !regressed {
            self.backward_jumps = 0;
            self.last_seen = Some(entry.timestamp);
            return false;
        }

        self.backward_jumps += 1;
        if self.backward_jumps < JUMPS_TO_CONFIRM {
            return false;
        }

        // Confirmed: the new epoch starts at this entry
        self.backward_jumps = 0;
        self.last_seen = Some(entry.timestamp);
        true
    }

    /// Forget all stream state
    pub fn reset(&mut self) {
        self.last_seen = None;
        self.backward_jumps = 0;
    }
}
