//! Local automation command server for a single-threaded host.
//!
//! External tools drive the host over loopback HTTP: each request names a
//! command in its path, carries a shared token in `X-AI-Token`, and gets back
//! a JSON envelope. The host's state is not thread-safe, so nothing outside
//! the execution thread touches it; the listener marshals every command onto
//! that thread and blocks until it has a reply.
//!
//! The moving parts:
//!
//! - [`transport`] accepts HTTP requests on a background thread.
//! - [`marshal`] hands closures to the execution thread and returns results.
//! - [`dispatch`] checks the kill switch and token, resolves built-ins before
//!   registered routes, and shapes the envelope.
//! - [`host`] abstracts the scene, build, compiler and test collaborators,
//!   with a headless implementation so the daemon runs standalone.
//! - [`memory`] persists append-only journals and a key-value file.
//!
//! [`run_daemon`] bootstraps configuration and telemetry, then runs commands
//! on the calling thread until a termination signal arrives.

mod bootstrap;
pub mod console;
pub mod context;
pub mod dispatch;
mod health;
pub mod host;
pub mod marshal;
pub mod memory;
mod process;
pub mod server;
pub mod telemetry;
pub mod test_bridge;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use context::{CommandContext, ContextOptions, ServerContext};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use server::{Server, ServerError, ServerHandle};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
