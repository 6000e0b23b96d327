// =============================================================================
// Injectable Clock
// =============================================================================
//
// The decision engine never calls `Utc::now()` directly outside of this
// module. Tests pin time with `FixedClock`; production uses `SystemClock`.
// Timestamps are Unix milliseconds, matching the wire format in §6.
// =============================================================================

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// A source of the current time, injectable so tests can pin it.
pub trait Clock: Send + Sync {
    /// Current time as Unix milliseconds.
    fn now_millis(&self) -> i64;
}

/// Production clock backed by the system's real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock pinned to a fixed instant, with an `advance` escape hatch for
/// tests that need to simulate TTL expiry deterministically.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Move the clock forward by `delta_millis` (may be negative).
    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
        clock.advance(-200);
        assert_eq!(clock.now_millis(), 1_300);
    }

    #[test]
    fn system_clock_is_plausible() {
        let clock = SystemClock;
        assert!(clock.now_millis() > 1_700_000_000_000);
    }
}
