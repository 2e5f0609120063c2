//! Simulated time source shared by the run loop and the drone.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Monotonic simulated clock with an advisory lock.
///
/// The lock implements lockstep pacing: the run loop locks the clock after advancing
/// it, and the drone unlocks it once it has published the sensor data for that instant.
/// Time never goes backwards. The lock is a flag, not a mutual-exclusion primitive.
#[derive(Debug, Default)]
pub struct SimClock {
    time_us: AtomicU64,
    locked: AtomicBool,
}

impl SimClock {
    /// Creates an unlocked clock at time zero.
    pub fn new() -> Self {
        SimClock::default()
    }

    /// Current simulated time in microseconds.
    pub fn now_us(&self) -> u64 {
        self.time_us.load(Ordering::Acquire)
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        Duration::from_micros(self.now_us())
    }

    /// Advances the clock unconditionally and returns the new time in microseconds.
    pub fn advance(&self, dt: Duration) -> u64 {
        let delta = u64::try_from(dt.as_micros()).unwrap_or(u64::MAX);
        self.time_us
            .fetch_add(delta, Ordering::AcqRel)
            .saturating_add(delta)
    }

    /// Advances the clock if it is unlocked, then locks it.
    ///
    /// Returns `false` and leaves the time untouched while the clock is locked.
    pub fn try_advance_locked(&self, dt: Duration) -> bool {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.advance(dt);
        true
    }

    pub fn lock_time(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn unlock_time(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}
