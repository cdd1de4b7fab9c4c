//! Rolling throughput counters and the periodic report that prints them.

mod counter;
pub mod format;
mod reporter;

pub use counter::RollingWindowCounter;
pub use format::{DEFAULT_INTERVAL_SECS, HEADER_EVERY};
pub use reporter::StatsReporter;
