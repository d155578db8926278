//! Process lifecycle: launch sequencing and shutdown signalling.

use std::time::Duration;

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::run_daemon;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
/// How often the main-thread executor checks for a shutdown request.
pub(crate) const FRAME_INTERVAL: Duration = Duration::from_millis(16);
