//! Command server bootstrap orchestration.

use std::sync::Arc;

use relay_config::{Config, ConfigError, ResolvedToken, resolve_token};
use thiserror::Error;

use crate::console::ConsoleHandle;
use crate::context::{ContextOptions, ServerContext};
use crate::health::HealthReporter;
use crate::host::{GitAutoCommit, HostBindings, headless};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load()
    }
}

/// Loader that returns a pre-built configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        self.config.clone().resolved()
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
#[derive(Debug)]
pub struct Daemon {
    config: Config,
    token: ResolvedToken,
    console: ConsoleHandle,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The token requests are checked against.
    #[must_use]
    pub fn token(&self) -> &ResolvedToken {
        &self.token
    }

    /// Ring buffer mirroring the server's log output.
    #[must_use]
    pub fn console(&self) -> &ConsoleHandle {
        &self.console
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Headless host collaborators for the configured project, with git
    /// auto-commit attached when enabled.
    #[must_use]
    pub fn host_bindings(&self) -> HostBindings {
        let root = self.config.project_root().as_std_path();
        let mut bindings = headless::bindings(root, self.console.clone());
        if self.config.auto_commit() {
            bindings.committer = Some(Box::new(GitAutoCommit::new(root)));
        }
        bindings
    }

    /// Execution-thread state wired from this bootstrap.
    #[must_use]
    pub fn server_context(&self) -> ServerContext {
        ServerContext::new(
            ContextOptions::from_config(&self.config, self.token.clone()),
            self.host_bindings(),
        )
    }
}

/// Bootstraps the command server using the supplied collaborators.
///
/// Loads configuration, installs telemetry (mirroring events into a fresh
/// console ring) and resolves the auth token once.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration or telemetry fail. The
/// reporter observes the failure before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let console = ConsoleHandle::default();
    let telemetry = match telemetry::initialise(&config, Some(console.clone())) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let token = resolve_token(&config.token_sources());
    reporter.bootstrap_succeeded(&config, token.origin());

    Ok(Daemon {
        config,
        token,
        console,
        telemetry,
    })
}
