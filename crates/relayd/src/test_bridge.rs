//! Drives the host's test runner and aggregates what it reports.
//!
//! The runner pushes events into a [`TestEventSink`] from whatever thread it
//! likes. The bridge waits for them in a bounded loop on the execution thread
//! and returns whatever arrived before the run finished or the deadline hit.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::host::HostError;

const TESTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::tests");

/// Lower bound on the wait for a run to finish.
pub const TIMEOUT_FLOOR: Duration = Duration::from_secs(30);
/// Wait used when the caller gives no timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Upper bound on the wait, whatever the caller asks for.
pub const TIMEOUT_CEILING: Duration = Duration::from_secs(60 * 60);
const EVENT_POLL: Duration = Duration::from_millis(100);

/// Which tests to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    /// Tests that run without entering play mode.
    #[default]
    EditMode,
    /// Tests that run inside play mode.
    PlayMode,
    /// Both sets.
    All,
}

/// Outcome of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result reported for one finished test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub full_name: String,
    pub duration_seconds: f64,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

/// Events a runner reports while a run is in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum TestEvent {
    /// A single test completed.
    TestFinished(TestResult),
    /// The whole run completed.
    RunFinished,
}

/// Sending side handed to a [`TestRunner`].
#[derive(Debug, Clone)]
pub struct TestEventSink {
    sender: Sender<TestEvent>,
}

impl TestEventSink {
    /// Reports a finished test. Events after the bridge stopped listening are
    /// dropped.
    pub fn test_finished(&self, result: TestResult) {
        let _ = self.sender.send(TestEvent::TestFinished(result));
    }

    /// Reports the end of the run.
    pub fn run_finished(&self) {
        let _ = self.sender.send(TestEvent::RunFinished);
    }
}

/// Host test runner.
pub trait TestRunner {
    /// Starts a run. Results may be reported before this returns or later
    /// from another thread.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the run cannot be started.
    fn start(&mut self, mode: TestMode, sink: TestEventSink) -> Result<(), HostError>;
}

/// Aggregate returned by `run-tests`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunSummary {
    pub mode: TestMode,
    /// False when the deadline passed before the runner reported completion.
    pub finished: bool,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_seconds: f64,
    pub results: Vec<TestResult>,
}

impl TestRunSummary {
    fn new(mode: TestMode) -> Self {
        Self {
            mode,
            finished: false,
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            duration_seconds: 0.0,
            results: Vec::new(),
        }
    }

    fn record(&mut self, result: TestResult) {
        self.total += 1;
        match result.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
        self.duration_seconds += result.duration_seconds;
        self.results.push(result);
    }
}

/// Bounded wait around a [`TestRunner`].
#[derive(Debug, Clone, Copy)]
pub struct TestBridge {
    floor: Duration,
}

impl Default for TestBridge {
    fn default() -> Self {
        Self {
            floor: TIMEOUT_FLOOR,
        }
    }
}

impl TestBridge {
    /// Bridge whose timeout floor is `floor` instead of [`TIMEOUT_FLOOR`].
    #[must_use]
    pub const fn with_floor(floor: Duration) -> Self {
        Self { floor }
    }

    /// Effective wait for a requested timeout in seconds, clamped between
    /// the floor and [`TIMEOUT_CEILING`].
    #[must_use]
    pub fn effective_timeout(&self, requested: Option<u64>) -> Duration {
        requested
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
            .clamp(self.floor, TIMEOUT_CEILING.max(self.floor))
    }

    /// Runs tests in `mode` and waits for results.
    ///
    /// A run that outlives the timeout yields the partial aggregate with
    /// `finished` left false.
    ///
    /// # Errors
    ///
    /// Propagates the runner's failure to start.
    pub fn run(
        &self,
        runner: &mut dyn TestRunner,
        mode: TestMode,
        timeout: Duration,
    ) -> Result<TestRunSummary, HostError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        runner.start(mode, TestEventSink { sender })?;
        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + TIMEOUT_CEILING);
        Ok(collect(&receiver, mode, deadline))
    }
}

fn collect(receiver: &Receiver<TestEvent>, mode: TestMode, deadline: Instant) -> TestRunSummary {
    let mut summary = TestRunSummary::new(mode);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(
                target: TESTS_TARGET,
                ?mode,
                collected = summary.total,
                "test run timed out; returning partial results"
            );
            break;
        }
        match receiver.recv_timeout(remaining.min(EVENT_POLL)) {
            Ok(TestEvent::TestFinished(result)) => summary.record(result),
            Ok(TestEvent::RunFinished) => {
                summary.finished = true;
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!(
                    target: TESTS_TARGET,
                    "test runner released its sink without finishing"
                );
                break;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    fn result(name: &str, status: TestStatus) -> TestResult {
        TestResult {
            name: name.to_owned(),
            full_name: format!("Suite.{name}"),
            duration_seconds: 0.5,
            status,
            message: None,
            stacktrace: None,
        }
    }

    struct ScriptedRunner {
        results: Vec<TestResult>,
        finish: bool,
        sinks: Vec<TestEventSink>,
    }

    impl TestRunner for ScriptedRunner {
        fn start(&mut self, _mode: TestMode, sink: TestEventSink) -> Result<(), HostError> {
            let results = self.results.clone();
            let finish = self.finish;
            let worker_sink = sink.clone();
            thread::spawn(move || {
                for result in results {
                    worker_sink.test_finished(result);
                }
                if finish {
                    worker_sink.run_finished();
                }
            });
            // Keep the sink alive so an unfinished run has to time out.
            self.sinks.push(sink);
            Ok(())
        }
    }

    #[test]
    fn aggregates_results_until_run_finished() {
        let mut runner = ScriptedRunner {
            results: vec![
                result("A", TestStatus::Passed),
                result("B", TestStatus::Failed),
                result("C", TestStatus::Skipped),
            ],
            finish: true,
            sinks: Vec::new(),
        };
        let summary = TestBridge::with_floor(Duration::ZERO)
            .run(&mut runner, TestMode::EditMode, Duration::from_secs(5))
            .expect("run");
        assert!(summary.finished);
        assert_eq!(
            (summary.total, summary.passed, summary.failed, summary.skipped),
            (3, 1, 1, 1)
        );
        let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn timeout_returns_partial_results() {
        let mut runner = ScriptedRunner {
            results: vec![result("A", TestStatus::Passed)],
            finish: false,
            sinks: Vec::new(),
        };
        let summary = TestBridge::with_floor(Duration::ZERO)
            .run(&mut runner, TestMode::PlayMode, Duration::from_millis(300))
            .expect("run");
        assert!(!summary.finished);
        assert_eq!(summary.total, 1);
    }

    #[test]
    fn effective_timeout_respects_floor() {
        let bridge = TestBridge::default();
        assert_eq!(bridge.effective_timeout(Some(1)), TIMEOUT_FLOOR);
        assert_eq!(
            bridge.effective_timeout(Some(90)),
            Duration::from_secs(90)
        );
        assert_eq!(bridge.effective_timeout(None), DEFAULT_TIMEOUT);
    }

    #[test]
    fn huge_timeouts_are_capped() {
        let bridge = TestBridge::default();
        assert_eq!(bridge.effective_timeout(Some(u64::MAX)), TIMEOUT_CEILING);
    }

    #[test]
    fn unrepresentable_deadline_still_runs() {
        let mut runner = ScriptedRunner {
            results: vec![result("A", TestStatus::Passed)],
            finish: true,
            sinks: Vec::new(),
        };
        let summary = TestBridge::with_floor(Duration::ZERO)
            .run(&mut runner, TestMode::EditMode, Duration::MAX)
            .expect("run");
        assert!(summary.finished);
        assert_eq!(summary.passed, 1);
    }

    #[test]
    fn modes_parse_from_lowercase_names() {
        let mode: TestMode = serde_json::from_str("\"playmode\"").expect("parse");
        assert_eq!(mode, TestMode::PlayMode);
    }
}
