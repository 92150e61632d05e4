use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Trailing admission window
const WINDOW: Duration = Duration::from_millis(1000);

/// Sliding-window admission gate.
///
/// Keeps the instants of admitted events within the trailing one-second
/// window. This is a discard gate, not a queue: a rejected event is
/// immediate data loss and the caller is expected to count it.
#[derive(Clone)]
pub struct RateLimiter {
    /// Admission instants inside the window, oldest first
    window: Arc<Mutex<VecDeque<Instant>>>,

    /// Window size mirrored for lock-free polling
    cached_rate: Arc<AtomicUsize>,

    /// Maximum admissions per window
    max_per_second: usize,
}

impl RateLimiter {
    pub fn new(max_per_second: usize) -> Self {
        Self {
            window: Arc::new(Mutex::new(VecDeque::with_capacity(max_per_second.min(4096)))),
            cached_rate: Arc::new(AtomicUsize::new(0)),
            max_per_second,
        }
    }

    /// Admission check: purge stale instants, reject at capacity without
    /// recording, otherwise record now and admit. Returns true when the
    /// event must be dropped.
    pub fn should_drop(&self) -> bool {
        self.should_drop_at(Instant::now())
    }

    fn should_drop_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock();
        purge(&mut window, now);
        let drop = window.len() >= self.max_per_second;
        if !drop {
            window.push_back(now);
        }
        self.cached_rate.store(window.len(), Ordering::Relaxed);
        drop
    }

    /// Record an admitted event without enforcing the cap. Used when
    /// backpressure is disabled so the trailing rate stays observable.
    pub fn record(&self) {
        self.record_at(Instant::now());
    }

    fn record_at(&self, now: Instant) {
        let mut window = self.window.lock();
        purge(&mut window, now);
        window.push_back(now);
        self.cached_rate.store(window.len(), Ordering::Relaxed);
    }

    /// Admissions in the trailing window.
    ///
    /// Re-purges opportunistically when the lock is free; a stats poll
    /// never waits behind the ingest path.
    pub fn rate(&self) -> usize {
        self.rate_at(Instant::now())
    }

    fn rate_at(&self, now: Instant) -> usize {
        if let Some(mut window) = self.window.try_lock() {
            purge(&mut window, now);
            self.cached_rate.store(window.len(), Ordering::Relaxed);
        }
        self.cached_rate.load(Ordering::Relaxed)
    }

    /// Forget every recorded admission
    pub fn reset(&self) {
        self.window.lock().clear();
        self.cached_rate.store(0, Ordering::Relaxed);
    }

    pub fn max_per_second(&self) -> usize {
        self.max_per_second
    }
}

/// Drop instants that have aged out of the window, oldest first
fn purge(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit_then_drops() {
        let limiter = RateLimiter::new(10);
        let base = Instant::now();
        for _ in 0..10 {
            assert!(!limiter.should_drop_at(base));
        }
        assert!(limiter.should_drop_at(base));
        assert!(limiter.should_drop_at(base + Duration::from_millis(500)));
        assert_eq!(limiter.rate_at(base), 10);
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let limiter = RateLimiter::new(2);
        let base = Instant::now();
        assert!(!limiter.should_drop_at(base));
        assert!(!limiter.should_drop_at(base));
        for _ in 0..50 {
            assert!(limiter.should_drop_at(base));
        }
        // Window still holds exactly the two admissions
        assert_eq!(limiter.rate_at(base), 2);
    }

    #[test]
    fn test_window_expiry_readmits() {
        let limiter = RateLimiter::new(3);
        let base = Instant::now();
        for _ in 0..3 {
            assert!(!limiter.should_drop_at(base));
        }
        assert!(limiter.should_drop_at(base + Duration::from_millis(999)));
        // One second on, the original admissions have aged out
        assert!(!limiter.should_drop_at(base + Duration::from_millis(1001)));
    }

    #[test]
    fn test_rate_decays_without_admissions() {
        let limiter = RateLimiter::new(100);
        let base = Instant::now();
        for _ in 0..5 {
            limiter.record_at(base);
        }
        assert_eq!(limiter.rate_at(base + Duration::from_millis(10)), 5);
        assert_eq!(limiter.rate_at(base + Duration::from_millis(1500)), 0);
    }

    #[test]
    fn test_record_bypasses_cap() {
        let limiter = RateLimiter::new(2);
        let base = Instant::now();
        for _ in 0..7 {
            limiter.record_at(base);
        }
        assert_eq!(limiter.rate_at(base), 7);
    }

    #[test]
    fn test_reset_clears_window() {
        let limiter = RateLimiter::new(1);
        let base = Instant::now();
        assert!(!limiter.should_drop_at(base));
        assert!(limiter.should_drop_at(base));
        limiter.reset();
        assert_eq!(limiter.rate_at(base), 0);
        assert!(!limiter.should_drop_at(base));
    }
}
