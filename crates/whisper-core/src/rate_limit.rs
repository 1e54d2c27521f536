use std::collections::VecDeque;
use std::time::{Duration, Instant};

use whisper_shared::constants::RATE_LIMIT;

const WINDOW: Duration = Duration::from_millis(1000);

/// Sliding-window admission for per-session sends.
///
/// An action is admitted while fewer than `max_per_second` recorded
/// timestamps fall inside the trailing 1000 ms window. Applies to text and
/// action sends only; commands and system traffic are exempt.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_second: u32,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            timestamps: VecDeque::new(),
        }
    }

    /// True iff another action would currently be admitted.
    pub fn can_proceed(&mut self) -> bool {
        self.can_proceed_at(Instant::now())
    }

    /// Admit and record one action. Returns false and records nothing when
    /// the window is full.
    pub fn record(&mut self) -> bool {
        self.record_at(Instant::now())
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) >= WINDOW {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn can_proceed_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        (self.timestamps.len() as u32) < self.max_per_second
    }

    fn record_at(&mut self, now: Instant) -> bool {
        if !self.can_proceed_at(now) {
            return false;
        }
        self.timestamps.push_back(now);
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit() {
        let mut limiter = RateLimiter::new(10);
        let now = Instant::now();

        for _ in 0..10 {
            assert!(limiter.record_at(now));
        }
        assert!(!limiter.record_at(now));
        assert!(!limiter.can_proceed_at(now));
    }

    #[test]
    fn test_rejected_record_makes_no_change() {
        let mut limiter = RateLimiter::new(1);
        let now = Instant::now();

        assert!(limiter.record_at(now));
        assert!(!limiter.record_at(now));

        // The rejection above must not have counted against the window
        let later = now + WINDOW;
        assert!(limiter.record_at(later));
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = RateLimiter::new(10);
        let now = Instant::now();

        for _ in 0..10 {
            assert!(limiter.record_at(now));
        }
        assert!(!limiter.record_at(now + Duration::from_millis(999)));
        // 1000 ms after the first record the window has moved past it
        assert!(limiter.record_at(now + WINDOW));
    }

    #[test]
    fn test_reset_clears_window() {
        let mut limiter = RateLimiter::new(2);
        let now = Instant::now();

        assert!(limiter.record_at(now));
        assert!(limiter.record_at(now));
        assert!(!limiter.can_proceed_at(now));

        limiter.reset();
        assert!(limiter.can_proceed_at(now));
    }

    #[test]
    fn test_default_limit() {
        let mut limiter = RateLimiter::default();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.record_at(now));
        }
        assert!(!limiter.record_at(now));
    }
}
