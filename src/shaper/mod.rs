//! Token bucket traffic shaping.

mod bucket;
mod limiter;

pub use bucket::{TokenBucket, DEFAULT_LIMIT, DEFAULT_RATE, UNLIMITED};
pub use limiter::TokenBucketLimiter;
