//! Rolling per-second counter.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, MonotonicClock};
use crate::error::{FlowmeterError, Result};

/// Accumulates a quantity per wall-clock second over a circular buffer.
///
/// The buffer holds `max_window + 2` one-second slots. The head slot is the
/// current second; walking backwards gives progressively older seconds. The
/// oldest slot is the clearing boundary and is never summed, so at most
/// `max_window + 1` seconds of history can be read.
///
/// Time is advanced lazily: every read and write first rotates the buffer to
/// the current second, zeroing the slots of seconds that saw no activity.
/// The clock is read while holding the lock, so concurrent callers always
/// advance in clock order.
pub struct RollingWindowCounter {
    name: String,
    clock: Arc<dyn Clock>,
    state: Mutex<CounterState>,
}

struct CounterState {
    slots: Vec<u64>,
    /// Slot of the current second
    head: usize,
    /// Second the head slot belongs to
    head_timestamp: u64,
    /// Time of the previous `get_since_last`
    last_read: u64,
}

impl CounterState {
    fn advance(&mut self, now: u64) {
        assert!(
            now >= self.head_timestamp,
            "clock went backwards: {} < {}",
            now,
            self.head_timestamp
        );

        let elapsed = now - self.head_timestamp;
        if elapsed == 0 {
            return;
        }

        let len = self.slots.len();
        if elapsed >= len as u64 {
            self.slots.fill(0);
            self.head = ((self.head as u64 + elapsed) % len as u64) as usize;
        } else {
            for _ in 0..elapsed {
                self.head = (self.head + 1) % len;
                self.slots[self.head] = 0;
            }
        }
        self.head_timestamp = now;
    }

    /// Sum of the `secs` most recent slots, head included.
    fn sum(&self, secs: usize) -> u64 {
        let len = self.slots.len();
        let mut index = self.head;
        let mut total: u64 = 0;
        for _ in 0..secs {
            total = total.saturating_add(self.slots[index]);
            index = if index == 0 { len - 1 } else { index - 1 };
        }
        total
    }
}

impl RollingWindowCounter {
    /// Create a counter able to answer windows of up to `max_window + 1`
    /// seconds, timed by a `MonotonicClock`.
    pub fn new(name: impl Into<String>, max_window: usize) -> Result<Self> {
        Self::with_clock(name, max_window, Arc::new(MonotonicClock::new()))
    }

    /// Create a counter timed by the given clock.
    ///
    /// Fails with `FlowmeterError::OutOfMemory` if the slot array cannot be
    /// allocated.
    pub fn with_clock(
        name: impl Into<String>,
        max_window: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let name = name.into();

        let len = max_window.checked_add(2).ok_or_else(|| FlowmeterError::OutOfMemory {
            name: name.clone(),
            slots: usize::MAX,
        })?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(len)
            .map_err(|_| FlowmeterError::OutOfMemory {
                name: name.clone(),
                slots: len,
            })?;
        slots.resize(len, 0);

        let now = clock.now();
        debug!(counter = %name, slots = len, "Creating rolling window counter");

        Ok(Self {
            name,
            clock,
            state: Mutex::new(CounterState {
                slots,
                head: 0,
                head_timestamp: now,
                last_read: now,
            }),
        })
    }

    /// Add `value` to the current second.
    pub fn accum(&self, value: u64) {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.advance(now);
        let head = state.head;
        state.slots[head] = state.slots[head].saturating_add(value);
    }

    /// Total accumulated over the last `secs` seconds, the current one
    /// included.
    ///
    /// # Panics
    ///
    /// Panics if `secs` is not less than `buffer_len()`.
    pub fn get_window(&self, secs: usize) -> u64 {
        let mut state = self.state.lock();
        assert!(
            secs < state.slots.len(),
            "window of {} seconds exceeds buffer of {} slots",
            secs,
            state.slots.len()
        );
        let now = self.clock.now();
        state.advance(now);
        state.sum(secs)
    }

    /// Total accumulated since the previous call, and the number of seconds
    /// that total covers.
    ///
    /// The covered span is capped at `buffer_len() - 1` seconds. A span of 0
    /// means no new data, not a zero rate.
    ///
    /// The span is `(previous read, now]` with the current second included,
    /// so a value added during the second of the previous read, after that
    /// read, is never reported. Callers polling on whole-second intervals
    /// lose at most that one partial second per interval.
    pub fn get_since_last(&self) -> (u64, u64) {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.advance(now);

        let max_span = (state.slots.len() - 1) as u64;
        let elapsed = (now - state.last_read).min(max_span);
        let value = state.sum(elapsed as usize);
        state.last_read = now;

        (value, elapsed)
    }

    /// Column name used by the reporter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of one-second slots in the circular buffer.
    pub fn buffer_len(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Largest window the counter was created for.
    pub fn max_window(&self) -> usize {
        self.buffer_len() - 2
    }
}

impl std::fmt::Debug for RollingWindowCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RollingWindowCounter")
            .field("name", &self.name)
            .field("slots", &state.slots.len())
            .field("head", &state.head)
            .field("head_timestamp", &state.head_timestamp)
            .field("last_read", &state.last_read)
            .finish()
    }
}
