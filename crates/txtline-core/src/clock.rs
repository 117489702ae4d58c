//! Wall-clock source, injected wherever ids or ages depend on "now".

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> u128;

    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64 {
        (self.now_nanos() / 1_000_000) as u64
    }

    /// Whole seconds since the Unix epoch.
    fn now_secs(&self) -> i64 {
        (self.now_nanos() / 1_000_000_000) as i64
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Stored as milliseconds.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            ms: AtomicU64::new(start_ms),
        }
    }

    pub fn set_ms(&self, ms: u64) {
        self.ms.store(ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: u64) {
        self.ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u128 {
        self.ms.load(Ordering::SeqCst) as u128 * 1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new(5_000);
        assert_eq!(clock.now_ms(), 5_000);
        assert_eq!(clock.now_secs(), 5);

        clock.advance_ms(2_500);
        assert_eq!(clock.now_ms(), 7_500);

        clock.set_ms(60_000);
        assert_eq!(clock.now_secs(), 60);
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
