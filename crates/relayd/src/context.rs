//! State owned by the execution thread.
//!
//! [`ServerContext`] replaces process-wide globals: the gate, the route
//! registry, the memory store and the host collaborators all hang off one
//! value that only the execution thread touches. Handlers see a narrower
//! [`CommandContext`] borrowed from it for the duration of one command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_config::{Config, DEFAULT_GENERATED_DIR, DEFAULT_MEMORY_DIR, ResolvedToken};
use tracing::debug;

use crate::console::LogSource;
use crate::dispatch::{Gate, RouteEntry, RouteRegistry, commands};
use crate::host::{BuildPipeline, Compiler, HostBindings, ReloadOutcome, SceneHost};
use crate::memory::MemoryStore;
use crate::test_bridge::{TIMEOUT_FLOOR, TestBridge, TestRunner};

const COMMIT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commit");

/// Upper bound `wait-for-compile` blocks for.
pub const COMPILE_WAIT_LIMIT: Duration = Duration::from_secs(60);
const COMPILE_POLL: Duration = Duration::from_millis(250);

/// Tunables for a [`ServerContext`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub memory_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub token: ResolvedToken,
    pub test_timeout_floor: Duration,
    pub compile_wait_limit: Duration,
    pub compile_poll: Duration,
}

impl ContextOptions {
    /// Options derived from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config, token: ResolvedToken) -> Self {
        Self {
            memory_dir: config.memory_dir().into_std_path_buf(),
            generated_dir: config.generated_dir().into_std_path_buf(),
            token,
            test_timeout_floor: TIMEOUT_FLOOR,
            compile_wait_limit: COMPILE_WAIT_LIMIT,
            compile_poll: COMPILE_POLL,
        }
    }

    /// Options rooted at `project_root` using the default layout.
    #[must_use]
    pub fn for_project(project_root: &Path, token: ResolvedToken) -> Self {
        Self {
            memory_dir: project_root.join(DEFAULT_MEMORY_DIR),
            generated_dir: project_root.join(DEFAULT_GENERATED_DIR),
            token,
            test_timeout_floor: TIMEOUT_FLOOR,
            compile_wait_limit: COMPILE_WAIT_LIMIT,
            compile_poll: COMPILE_POLL,
        }
    }
}

/// Everything the dispatcher needs, owned by the execution thread.
pub struct ServerContext {
    pub(crate) gate: Gate,
    pub(crate) registry: RouteRegistry,
    pub(crate) memory: MemoryStore,
    pub(crate) bridge: TestBridge,
    pub(crate) host: HostBindings,
    pub(crate) generated_dir: PathBuf,
    pub(crate) compile_wait_limit: Duration,
    pub(crate) compile_poll: Duration,
}

impl ServerContext {
    /// Context with the standard command set registered.
    #[must_use]
    pub fn new(options: ContextOptions, host: HostBindings) -> Self {
        Self::with_routes(options, host, commands::standard_routes())
    }

    /// Context with an explicit registration list.
    #[must_use]
    pub fn with_routes(
        options: ContextOptions,
        host: HostBindings,
        registrations: Vec<RouteEntry>,
    ) -> Self {
        Self {
            gate: Gate::new(options.token),
            registry: RouteRegistry::new(registrations),
            memory: MemoryStore::new(options.memory_dir),
            bridge: TestBridge::with_floor(options.test_timeout_floor),
            host,
            generated_dir: options.generated_dir,
            compile_wait_limit: options.compile_wait_limit,
            compile_poll: options.compile_poll,
        }
    }

    /// Auth and kill-switch state.
    #[must_use]
    pub const fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Mutable auth and kill-switch state, for admin actions.
    pub const fn gate_mut(&mut self) -> &mut Gate {
        &mut self.gate
    }

    /// Route tables.
    #[must_use]
    pub const fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// Journal and KV store.
    #[must_use]
    pub const fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Host collaborators.
    #[must_use]
    pub const fn host(&self) -> &HostBindings {
        &self.host
    }

    /// Mutable host collaborators.
    pub const fn host_mut(&mut self) -> &mut HostBindings {
        &mut self.host
    }

    /// Rebuilds the dynamic route table.
    pub fn reindex(&mut self) -> usize {
        self.registry.reindex()
    }

    /// Post-reload signal: adopts the reloaded handler list and reindexes.
    pub fn apply_reload(&mut self, outcome: ReloadOutcome) -> usize {
        self.registry.apply_reload(outcome)
    }

    pub(crate) fn command_context(&mut self) -> CommandContext<'_> {
        CommandContext {
            scene: &mut *self.host.scene,
            build: &mut *self.host.build,
            compiler: &mut *self.host.compiler,
            tests: &mut *self.host.tests,
            console: &*self.host.console,
            memory: &self.memory,
            bridge: self.bridge,
            generated_dir: &self.generated_dir,
        }
    }

    /// Commits the project after a mutating command. Failures are logged and
    /// dropped.
    pub(crate) fn auto_commit(&self, command: &str) {
        let Some(committer) = self.host.committer.as_deref() else {
            return;
        };
        if let Err(error) = committer.commit(&format!("AI:{command}")) {
            debug!(
                target: COMMIT_TARGET,
                command,
                %error,
                "auto-commit skipped"
            );
        }
    }
}

/// Per-command view of the server state handed to handlers.
pub struct CommandContext<'a> {
    scene: &'a mut dyn SceneHost,
    build: &'a mut dyn BuildPipeline,
    compiler: &'a mut dyn Compiler,
    tests: &'a mut dyn TestRunner,
    console: &'a dyn LogSource,
    memory: &'a MemoryStore,
    bridge: TestBridge,
    generated_dir: &'a Path,
}

impl CommandContext<'_> {
    /// Object graph and scene operations.
    pub fn scene(&mut self) -> &mut dyn SceneHost {
        &mut *self.scene
    }

    /// Build settings and player builds.
    pub fn build(&mut self) -> &mut dyn BuildPipeline {
        &mut *self.build
    }

    /// Compiler and asset import.
    pub fn compiler(&mut self) -> &mut dyn Compiler {
        &mut *self.compiler
    }

    /// Host test runner.
    pub fn tests(&mut self) -> &mut dyn TestRunner {
        &mut *self.tests
    }

    /// Host log ring.
    #[must_use]
    pub fn console(&self) -> &dyn LogSource {
        self.console
    }

    /// Journal and KV store.
    #[must_use]
    pub fn memory(&self) -> &MemoryStore {
        self.memory
    }

    /// Test-run waiting policy.
    #[must_use]
    pub const fn bridge(&self) -> TestBridge {
        self.bridge
    }

    /// Root that `write-file` may write beneath.
    #[must_use]
    pub fn generated_dir(&self) -> &Path {
        self.generated_dir
    }
}
