//! Shared harness for the crate-level suites.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use mockall::mock;
use relay_config::{Config, ConfigError, ListenEndpoint, ResolvedToken, TokenOrigin};
use serde_json::Value;
use tempfile::TempDir;

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::console::ConsoleHandle;
use crate::context::{ContextOptions, ServerContext};
use crate::health::HealthReporter;
use crate::host::{AutoCommit, CommitError, Compiler, HostBindings, HostError, ReloadOutcome};
use crate::host::headless;
use crate::server::{Server, ServerHandle};
use crate::transport::send_request;

/// Token every [`TestServer`] accepts.
pub const TOKEN: &str = "test-token";

mock! {
    pub Compiler {}

    impl Compiler for Compiler {
        fn is_compiling(&self) -> bool;
        fn import(&mut self, path: &Path) -> Result<(), HostError>;
        fn reload(&mut self) -> ReloadOutcome;
    }
}

mock! {
    pub Committer {}

    impl AutoCommit for Committer {
        fn commit(&self, message: &str) -> Result<(), CommitError>;
    }
}

/// Lifecycle events observed by [`RecordingHealthReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded(TokenOrigin),
    BootstrapFailed(String),
    ListenerReady(SocketAddr),
    ShutdownStarted,
    ShutdownCompleted,
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address reported by the listener, once it is ready.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.events().into_iter().find_map(|event| match event {
            HealthEvent::ListenerReady(addr) => Some(addr),
            _ => None,
        })
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config, token: TokenOrigin) {
        self.record(HealthEvent::BootstrapSucceeded(token));
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_ready(&self, addr: SocketAddr) {
        self.record(HealthEvent::ListenerReady(addr));
    }

    fn shutdown_started(&self) {
        self.record(HealthEvent::ShutdownStarted);
    }

    fn shutdown_completed(&self) {
        self.record(HealthEvent::ShutdownCompleted);
    }
}

/// Loader rooting the project in a temporary directory and binding an
/// ephemeral port.
pub struct TestConfigLoader {
    dir: TempDir,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temporary project root"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        let root = Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf())
            .expect("temporary project root was not valid UTF-8");
        Ok(Config {
            listen: ListenEndpoint::loopback(0),
            log_filter: String::from("warn"),
            ..Config::for_project(root)
        })
    }
}

/// Loader that fails by passing a routable listen address.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from_iter(["relayd", "--listen", "http://192.0.2.10:17890/"])
    }
}

/// Server on an ephemeral port with a dedicated execution thread, rooted in
/// a temporary project directory.
pub struct TestServer {
    dir: TempDir,
    console: ConsoleHandle,
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    /// Starts a server after letting `customise` swap host collaborators.
    pub fn start_with<F>(customise: F) -> Self
    where
        F: FnOnce(&mut HostBindings) + Send + 'static,
    {
        let dir = TempDir::new().expect("temp project root");
        let root: PathBuf = dir.path().to_path_buf();
        let console = ConsoleHandle::default();
        let host_console = console.clone();
        let handle = ServerHandle::spawn(&ListenEndpoint::loopback(0), move || {
            let mut bindings = headless::bindings(&root, host_console);
            customise(&mut bindings);
            let mut options = ContextOptions::for_project(&root, ResolvedToken::explicit(TOKEN));
            options.compile_poll = Duration::from_millis(5);
            options.compile_wait_limit = Duration::from_secs(2);
            ServerContext::new(options, bindings)
        })
        .expect("spawn test server");
        let addr = handle.server().local_addr();
        Self {
            dir,
            console,
            handle: Some(handle),
            addr,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn console(&self) -> &ConsoleHandle {
        &self.console
    }

    pub fn server(&self) -> &Server {
        self.handle
            .as_ref()
            .expect("server already stopped")
            .server()
    }

    /// Sends `command` with the valid token. `Value::Null` sends no body.
    pub fn call(&self, command: &str, body: &Value) -> (u16, Value) {
        let bytes = if body.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(body).expect("serialise body")
        };
        self.call_raw(command, Some(TOKEN), &bytes)
    }

    /// Sends raw bytes with an optional token.
    pub fn call_raw(&self, command: &str, token: Option<&str>, body: &[u8]) -> (u16, Value) {
        let headers: Vec<(&str, &str)> = token
            .map(|token| vec![("X-AI-Token", token)])
            .unwrap_or_default();
        let (status, text) = send_request(self.addr, &format!("/{command}"), &headers, body);
        let envelope = serde_json::from_str(&text)
            .unwrap_or_else(|error| panic!("response was not JSON ({error}): {text:?}"));
        (status, envelope)
    }

    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().expect("stop test server");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop();
        }
    }
}

/// Polls `probe` until it yields a value or two seconds pass.
pub fn wait_for<T>(mut probe: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if let Some(value) = probe() {
            return Some(value);
        }
        thread::sleep(Duration::from_millis(10));
    }
    None
}
