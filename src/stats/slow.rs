use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifetime tally of slow-statement log lines since the last reset.
pub struct SlowLogCounter {
    count: AtomicU64,
    /// Reset time as microseconds since the Unix epoch.
    reset_time_us: AtomicI64,
}

/// Point-in-time view of the slow-statement tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlowLogStats {
    pub count: u64,
    pub reset_time: DateTime<Utc>,
}

impl SlowLogCounter {
    /// Create a zeroed counter stamped with the current time.
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            reset_time_us: AtomicI64::new(Utc::now().timestamp_micros()),
        }
    }

    #[inline]
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> SlowLogStats {
        let us = self.reset_time_us.load(Ordering::Relaxed);
        SlowLogStats {
            count: self.count.load(Ordering::Relaxed),
            reset_time: DateTime::from_timestamp_micros(us).unwrap_or_default(),
        }
    }

    /// Zero the count and stamp the reset time with now.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.reset_time_us
            .store(Utc::now().timestamp_micros(), Ordering::Relaxed);
    }
}

impl Default for SlowLogCounter {
    fn default() -> Self {
        Self::new()
    }
}
