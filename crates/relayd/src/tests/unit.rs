//! Unit tests for bootstrap and context wiring.

use std::sync::Arc;

use rstest::rstest;

use crate::bootstrap_with;
use crate::dispatch::{Builtin, Resolved};

use super::support::{
    FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader,
};

#[rstest]
fn bootstrap_reports_start_and_success() {
    let loader = TestConfigLoader::new();
    let reporter = Arc::new(RecordingHealthReporter::default());

    let daemon = bootstrap_with(&loader, reporter.clone()).expect("bootstrap should succeed");

    let events = reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(events.contains(&HealthEvent::BootstrapSucceeded(daemon.token().origin())));
    assert_eq!(daemon.config().project_root().as_std_path(), loader.root());
}

#[rstest]
fn bootstrap_reports_configuration_failures() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&FailingConfigLoader, reporter.clone())
        .expect_err("routable listen address should fail");

    assert!(error.to_string().contains("failed to load configuration"));
    let events = reporter.events();
    assert!(matches!(
        events.as_slice(),
        [HealthEvent::BootstrapStarting, HealthEvent::BootstrapFailed(_)]
    ));
}

#[rstest]
fn server_context_registers_standard_routes() {
    let loader = TestConfigLoader::new();
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&loader, reporter).expect("bootstrap should succeed");

    let context = daemon.server_context();

    assert_eq!(context.registry().len(), 18);
    assert!(context.gate().is_enabled());
    assert!(matches!(
        context.registry().resolve("ping"),
        Ok(Resolved::Builtin(Builtin::Ping))
    ));
    assert!(matches!(
        context.registry().resolve("create-object"),
        Ok(Resolved::Route(_))
    ));
}

#[rstest]
fn auto_commit_is_wired_only_when_enabled() {
    let loader = TestConfigLoader::new();
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&loader, reporter).expect("bootstrap should succeed");
    assert!(daemon.host_bindings().committer.is_none());

    let mut config = daemon.config().clone();
    config.auto_commit = true;
    let loader = crate::StaticConfigLoader::new(config);
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&loader, reporter).expect("bootstrap should succeed");
    assert!(daemon.host_bindings().committer.is_some());
}
