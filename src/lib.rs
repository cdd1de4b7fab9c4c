//! Flowmeter - Traffic Shaping and Throughput Statistics
//!
//! This crate provides a token bucket limiter that gates resource consuming
//! work, rolling per-second counters that record activity, and a reporter
//! that periodically prints the counters' average rates as a text table.
//! Periodic work runs on dedicated Tokio timer tasks.

pub mod clock;
pub mod config;
pub mod error;
pub mod schedule;
pub mod shaper;
pub mod stats;
