//! Token bucket state.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

/// Default number of refill events per second.
pub const DEFAULT_RATE: u32 = 100;
/// Default bucket capacity.
pub const DEFAULT_LIMIT: u64 = 100 * 1000 * 1000;
/// A capacity that in practice never rejects.
pub const UNLIMITED: u64 = u64::MAX;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A bounded pool of tokens that drains on `request` and grows on `refill`.
///
/// The bucket starts full. Every refill event adds `capacity / rate` tokens,
/// so a bucket refilled `rate` times per second regains its full capacity
/// once per second. `available` never exceeds `capacity`.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum number of tokens
    capacity: u64,
    /// Refill events per second
    rate: u32,
    /// Tokens currently available
    available: Mutex<u64>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is 0.
    pub fn new(rate: u32, limit: u64) -> Self {
        assert!(rate > 0, "rate must be greater than 0");

        Self {
            capacity: limit,
            rate,
            available: Mutex::new(limit),
        }
    }

    /// Consume `n` tokens if that many are available.
    ///
    /// All-or-nothing: on rejection the bucket is left untouched and it is up
    /// to the caller what happens to the work (e.g. dropping a packet).
    pub fn request(&self, n: u64) -> bool {
        let mut available = self.available.lock();
        if *available >= n {
            *available -= n;
            true
        } else {
            trace!(requested = n, available = *available, "Token request rejected");
            false
        }
    }

    /// Run one refill event.
    pub fn refill(&self) {
        let amount = self.refill_amount();
        let mut available = self.available.lock();
        let previous = *available;
        *available = match previous.checked_add(amount) {
            Some(sum) if sum <= self.capacity => sum,
            _ => self.capacity,
        };
        trace!(previous, available = *available, "Token bucket refilled");
    }

    /// Tokens currently available.
    pub fn available(&self) -> u64 {
        *self.available.lock()
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Refill events per second.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Tokens added by a single refill event.
    pub fn refill_amount(&self) -> u64 {
        self.capacity / u64::from(self.rate)
    }

    /// Time between refill events.
    pub fn refill_period(&self) -> Duration {
        Duration::from_nanos((NANOS_PER_SEC / u64::from(self.rate)).max(1))
    }
}
