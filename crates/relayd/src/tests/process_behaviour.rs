//! Launch and shutdown of the full daemon on the calling thread.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, bounded};
use rstest::rstest;
use serde_json::{Value, json};

use crate::process::launch::{LaunchPlan, run_daemon_with};
use crate::process::{ShutdownError, ShutdownSignal};
use crate::transport::send_request;

use super::support::{
    FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader, wait_for,
};

/// Shutdown signal released by sending on a channel.
struct ChannelShutdown(Receiver<()>);

impl ShutdownSignal for ChannelShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        let _ = self.0.recv();
        Ok(())
    }
}

#[rstest]
fn daemon_serves_until_shutdown_signal() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (trigger, signal) = bounded(1);
    let plan = LaunchPlan {
        loader: TestConfigLoader::new(),
        reporter: reporter.clone(),
        shutdown: ChannelShutdown(signal),
    };
    let runner = thread::spawn(move || run_daemon_with(plan));

    let addr = wait_for(|| reporter.listener_addr()).expect("listener should become ready");
    let (status, body) = send_request(addr, "/ping", &[], b"");
    let envelope: Value = serde_json::from_str(&body).expect("json envelope");
    assert_eq!(status, 401);
    assert_eq!(envelope, json!({ "status": "error", "message": "unauthorized" }));

    trigger.send(()).expect("release shutdown");
    runner
        .join()
        .expect("daemon thread panicked")
        .expect("daemon should stop cleanly");

    let events = reporter.events();
    assert!(events.contains(&HealthEvent::ShutdownStarted));
    assert_eq!(events.last(), Some(&HealthEvent::ShutdownCompleted));
}

#[rstest]
fn daemon_reports_bootstrap_failure() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (_trigger, signal) = bounded(1);
    let plan = LaunchPlan {
        loader: FailingConfigLoader,
        reporter: reporter.clone(),
        shutdown: ChannelShutdown(signal),
    };

    let error = run_daemon_with(plan).expect_err("bootstrap should fail");

    assert!(matches!(error, crate::LaunchError::Bootstrap { .. }));
    assert!(reporter.listener_addr().is_none());
}
