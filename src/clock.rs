//! Second-resolution time sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of the current time in whole seconds.
pub trait Clock: Send + Sync {
    /// Current time in seconds. Successive calls never decrease.
    fn now(&self) -> u64;
}

/// Clock anchored at the wall time of its creation and driven by `Instant`.
///
/// Reports Unix seconds for readability but cannot step backwards when the
/// system clock is adjusted.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
    base: u64,
}

impl MonotonicClock {
    /// Start a clock at the current Unix time.
    pub fn new() -> Self {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            base,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        self.base + self.origin.elapsed().as_secs()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    /// Start a clock at `start` seconds.
    pub fn new(start: u64) -> Self {
        Self {
            secs: AtomicU64::new(start),
        }
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute time. Setting an earlier time is allowed here; the
    /// consumers of the clock decide whether that is a fault.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}
