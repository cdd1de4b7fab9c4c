//! Periodic timer tasks.
//!
//! Every component that needs a periodic callback owns one `PeriodicTask`.
//! The task sleeps until its next deadline, runs the tick closure to
//! completion and then computes the following deadline according to the
//! configured `SchedulePolicy`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// How the next deadline is derived once a tick has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePolicy {
    /// Next deadline is `period` after the tick actually finished. Intervals
    /// stretch under scheduler jitter.
    #[default]
    Drift,
    /// Deadlines stay on the `start + k * period` grid; late ticks are
    /// skipped rather than bunched up.
    FixedPhase,
}

/// Handle to a spawned periodic timer task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn a task that calls `tick` every `period`, first firing one period
    /// from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(
        name: &'static str,
        period: Duration,
        policy: SchedulePolicy,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        assert!(!period.is_zero(), "period must be greater than 0");

        debug!(task = name, period = ?period, policy = ?policy, "Spawning periodic task");

        let handle = tokio::spawn(async move {
            match policy {
                SchedulePolicy::Drift => loop {
                    time::sleep(period).await;
                    trace!(task = name, "Periodic tick");
                    tick();
                },
                SchedulePolicy::FixedPhase => {
                    let mut interval = time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        interval.tick().await;
                        trace!(task = name, "Periodic tick");
                        tick();
                    }
                }
            }
        });

        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Whether the task is still scheduled.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Cancel the pending tick. Calling this more than once is harmless.
    ///
    /// Ticks are synchronous, so a tick that has started always completes
    /// before the task observes the cancellation.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(task = self.name, "Cancelling periodic task");
            handle.abort();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
