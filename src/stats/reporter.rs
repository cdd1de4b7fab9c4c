//! Periodic throughput report.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::counter::RollingWindowCounter;
use super::format::{self, HEADER_EVERY};
use crate::error::{FlowmeterError, Result};
use crate::schedule::{PeriodicTask, SchedulePolicy};

/// Prints the average per-second rate of a set of counters as a table row
/// every interval.
///
/// The reporter only reads its counters; producers keep their own handles and
/// keep calling `accum` on them.
pub struct StatsReporter {
    table: Arc<Mutex<ReportTable>>,
    interval: Duration,
    policy: SchedulePolicy,
    task: Option<PeriodicTask>,
}

struct ReportTable {
    sink: Box<dyn Write + Send>,
    /// Registration order; the newest counter is printed first
    counters: Vec<Arc<RollingWindowCounter>>,
    /// Rows written since the last header, modulo `HEADER_EVERY`
    rows: u32,
}

impl ReportTable {
    fn columns(&self) -> impl Iterator<Item = &Arc<RollingWindowCounter>> {
        self.counters.iter().rev()
    }

    fn write_cycle(&mut self) -> io::Result<()> {
        let mut out = String::new();

        if self.rows == 0 {
            out.push_str(&format::header(self.columns().map(|c| c.name())));
        }
        self.rows = (self.rows + 1) % HEADER_EVERY;

        for counter in self.columns() {
            let (value, elapsed) = counter.get_since_last();
            out.push_str(&format::cell(format::rate(value, elapsed)));
        }
        out.push_str("|\n");

        self.sink.write_all(out.as_bytes())?;
        self.sink.flush()
    }
}

impl StatsReporter {
    /// Create a reporter writing to `sink` every `interval_secs` seconds once
    /// launched.
    ///
    /// # Panics
    ///
    /// Panics if `interval_secs` is 0.
    pub fn new(sink: impl Write + Send + 'static, interval_secs: u64) -> Self {
        Self::with_policy(sink, interval_secs, SchedulePolicy::Drift)
    }

    /// Like `new`, with an explicit schedule policy for the report cycle.
    pub fn with_policy(
        sink: impl Write + Send + 'static,
        interval_secs: u64,
        policy: SchedulePolicy,
    ) -> Self {
        assert!(interval_secs > 0, "interval must be greater than 0");

        Self {
            table: Arc::new(Mutex::new(ReportTable {
                sink: Box::new(sink),
                counters: Vec::new(),
                rows: 0,
            })),
            interval: Duration::from_secs(interval_secs),
            policy,
            task: None,
        }
    }

    /// A reporter writing to standard output.
    pub fn stdout(interval_secs: u64) -> Self {
        Self::new(io::stdout(), interval_secs)
    }

    /// Register a counter. May be called before or after `launch`.
    pub fn add_counter(&self, counter: Arc<RollingWindowCounter>) {
        debug!(counter = %counter.name(), "Registering counter with reporter");
        self.table.lock().counters.push(counter);
    }

    /// Number of registered counters.
    pub fn counter_count(&self) -> usize {
        self.table.lock().counters.len()
    }

    /// Start the report cycle. The first row is written one interval from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(&mut self) -> Result<()> {
        if self.task.as_ref().map_or(false, PeriodicTask::is_running) {
            return Err(FlowmeterError::AlreadyLaunched);
        }

        let table = Arc::clone(&self.table);
        self.task = Some(PeriodicTask::spawn(
            "stats-report",
            self.interval,
            self.policy,
            move || {
                if let Err(e) = table.lock().write_cycle() {
                    warn!(error = %e, "Failed to write statistics row");
                }
            },
        ));

        debug!(
            interval = ?self.interval,
            counters = self.counter_count(),
            "Stats reporter launched"
        );
        Ok(())
    }

    /// Run one report cycle immediately.
    pub fn report_once(&self) -> io::Result<()> {
        self.table.lock().write_cycle()
    }

    /// Cancel the report cycle. Subsequent calls do nothing.
    pub fn teardown(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
            debug!("Stats reporter torn down");
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for StatsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsReporter")
            .field("interval", &self.interval)
            .field("policy", &self.policy)
            .field("counters", &self.counter_count())
            .field("launched", &self.task.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tokio::time;

    const T0: u64 = 5_000;

    /// In-memory sink shared between the reporter and the test.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }

        fn lines(&self) -> Vec<String> {
            self.contents().lines().map(str::to_string).collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn counter(name: &str, clock: &Arc<ManualClock>) -> Arc<RollingWindowCounter> {
        Arc::new(RollingWindowCounter::with_clock(name, 10, clock.clone()).unwrap())
    }

    #[test]
    #[should_panic(expected = "interval must be greater than 0")]
    fn test_zero_interval_panics() {
        StatsReporter::new(SharedBuffer::default(), 0);
    }

    #[test]
    fn test_report_without_counters() {
        let buffer = SharedBuffer::default();
        let reporter = StatsReporter::new(buffer.clone(), 1);

        reporter.report_once().unwrap();
        assert_eq!(buffer.contents(), "+\n|\n+\n|\n");
    }

    #[test]
    fn test_report_rows() {
        let clock = Arc::new(ManualClock::new(T0));
        let rx = counter("rx", &clock);
        let tx = counter("tx", &clock);

        let buffer = SharedBuffer::default();
        let reporter = StatsReporter::new(buffer.clone(), 1);
        reporter.add_counter(Arc::clone(&rx));
        reporter.add_counter(Arc::clone(&tx));
        assert_eq!(reporter.counter_count(), 2);

        clock.advance(1);
        rx.accum(50_000);
        tx.accum(9_999);
        reporter.report_once().unwrap();

        // No time passed, so no new data.
        reporter.report_once().unwrap();

        clock.advance(2);
        rx.accum(3);
        reporter.report_once().unwrap();

        let expected = concat!(
            "+------------------+------------------+\n",
            "|               tx |               rx |\n",
            "+------------------+------------------+\n",
            "|            9999  |              50K |\n",
            "|               0  |               0  |\n",
            "|               0  |               1  |\n",
        );
        assert_eq!(buffer.contents(), expected);
    }

    #[test]
    fn test_header_repeats_every_21_rows() {
        let clock = Arc::new(ManualClock::new(T0));
        let buffer = SharedBuffer::default();
        let reporter = StatsReporter::new(buffer.clone(), 1);
        reporter.add_counter(counter("rx", &clock));

        for _ in 0..43 {
            reporter.report_once().unwrap();
        }

        let lines = buffer.lines();
        let header_rows: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains("rx"))
            .map(|(i, _)| i)
            .collect();

        // Each header block is 3 lines followed by 21 data rows.
        assert_eq!(header_rows, vec![1, 25, 49]);
        assert_eq!(lines.len(), 3 * 3 + 43);
    }

    #[test]
    fn test_report_error_is_returned() {
        let reporter = StatsReporter::new(BrokenSink, 1);
        let err = reporter.report_once().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_writes_every_interval() {
        let clock = Arc::new(ManualClock::new(T0));
        let rx = counter("rx", &clock);

        let buffer = SharedBuffer::default();
        let mut reporter = StatsReporter::new(buffer.clone(), 5);
        reporter.add_counter(Arc::clone(&rx));
        reporter.launch().unwrap();

        time::sleep(Duration::from_secs(4)).await;
        assert!(buffer.contents().is_empty());

        clock.advance(5);
        rx.accum(500);
        time::sleep(Duration::from_secs(2)).await;

        clock.advance(5);
        time::sleep(Duration::from_secs(5)).await;

        let lines = buffer.lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "|             100  |");
        assert_eq!(lines[4], "|               0  |");
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_twice_fails() {
        let mut reporter = StatsReporter::new(SharedBuffer::default(), 1);

        reporter.launch().unwrap();
        assert!(matches!(reporter.launch(), Err(FlowmeterError::AlreadyLaunched)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_reports() {
        let buffer = SharedBuffer::default();
        let mut reporter = StatsReporter::new(buffer.clone(), 1);
        reporter.launch().unwrap();

        time::sleep(Duration::from_millis(2500)).await;
        reporter.teardown();
        reporter.teardown();
        let written = buffer.contents();

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(buffer.contents(), written);
        assert_eq!(buffer.lines().len(), 3 + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_errors_do_not_stop_cycle() {
        let mut reporter = StatsReporter::new(BrokenSink, 1);
        reporter.launch().unwrap();

        time::sleep(Duration::from_millis(3500)).await;
        assert!(reporter.task.as_ref().unwrap().is_running());
    }
}
