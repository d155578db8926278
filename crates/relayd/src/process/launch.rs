//! Supervises launch sequencing and the main-thread run loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::marshal::{self, Executor};
use crate::server::Server;

use super::errors::LaunchError;
use super::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use super::{FRAME_INTERVAL, PROCESS_TARGET};

/// Collaborators required to launch the command server.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the command server using the production collaborators.
///
/// The calling thread becomes the execution thread: every command runs here,
/// while the listener accepts requests in the background.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, the listener or signal handling
/// fail.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::new(),
    })
}

/// Runs the command server with injected collaborators.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal + 'static,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
    } = plan;

    let daemon = bootstrap_with(&loader, Arc::clone(&reporter))?;
    let (marshaler, inbox) = marshal::channel();
    let mut executor = Executor::new(daemon.server_context(), inbox);
    let server = Server::start(daemon.config().listen(), marshaler)?;
    reporter.listener_ready(server.local_addr());

    let stop = Arc::new(AtomicBool::new(false));
    let waiter = spawn_signal_waiter(shutdown, Arc::clone(&stop))
        .map_err(|source| LaunchError::SignalThread { source })?;

    info!(
        target: PROCESS_TARGET,
        addr = %server.local_addr(),
        "running commands on the main thread"
    );
    executor.run_until(&stop, FRAME_INTERVAL);

    reporter.shutdown_started();
    server.request_stop();
    drop(executor.shutdown());
    let stopped = server.stop();
    let signal = waiter
        .join()
        .map_err(|_| LaunchError::SignalThreadPanic)?;
    stopped?;
    signal?;
    reporter.shutdown_completed();
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

fn spawn_signal_waiter<S>(
    shutdown: S,
    stop: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<Result<(), ShutdownError>>>
where
    S: ShutdownSignal + 'static,
{
    thread::Builder::new()
        .name(String::from("relay-signals"))
        .spawn(move || {
            let result = shutdown.wait();
            stop.store(true, Ordering::SeqCst);
            result
        })
}
