//! Token bucket limiter driven by its own refill task.

use std::sync::Arc;

use tracing::debug;

use super::bucket::TokenBucket;
use crate::schedule::{PeriodicTask, SchedulePolicy};

/// A token bucket whose refill events are fired by a dedicated timer task.
///
/// Producers call `request` from any thread; the refill task and producers
/// serialize on the bucket's lock.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    bucket: Arc<TokenBucket>,
    refill_task: PeriodicTask,
}

impl TokenBucketLimiter {
    /// Create a full bucket and schedule its first refill `1 / rate` seconds
    /// from now, rescheduling from actual fire time.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is 0.
    pub fn start(rate: u32, limit: u64) -> Self {
        Self::with_policy(rate, limit, SchedulePolicy::Drift)
    }

    /// Like `start`, with an explicit refill schedule policy.
    pub fn with_policy(rate: u32, limit: u64, policy: SchedulePolicy) -> Self {
        let bucket = Arc::new(TokenBucket::new(rate, limit));
        let period = bucket.refill_period();

        let refill_bucket = Arc::clone(&bucket);
        let refill_task = PeriodicTask::spawn("shaper-refill", period, policy, move || {
            refill_bucket.refill();
        });

        debug!(
            rate,
            limit,
            refill_amount = bucket.refill_amount(),
            period = ?period,
            "Token bucket limiter started"
        );

        Self {
            bucket,
            refill_task,
        }
    }

    /// Consume `n` tokens if available. See `TokenBucket::request`.
    pub fn request(&self, n: u64) -> bool {
        self.bucket.request(n)
    }

    /// Tokens currently available.
    pub fn available(&self) -> u64 {
        self.bucket.available()
    }

    /// The underlying bucket.
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }

    /// Cancel the refill schedule. Subsequent calls do nothing.
    pub fn teardown(&mut self) {
        if self.refill_task.is_running() {
            debug!(available = self.bucket.available(), "Tearing down token bucket limiter");
        }
        self.refill_task.cancel();
    }
}

impl Drop for TokenBucketLimiter {
    fn drop(&mut self) {
        self.teardown();
    }
}
