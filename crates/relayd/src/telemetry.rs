//! Structured telemetry initialisation for the command server.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use relay_config::{Config, LogFormat};
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

use crate::console::{ConsoleHandle, ConsoleLayer};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// When `console` is supplied, every event that passes the filter is also
/// mirrored into it so `console-read` can return the server's own log.
/// Repeated calls are idempotent: only the first invocation installs the
/// subscriber, and later `console` handles are ignored.
///
/// # Examples
///
/// ```rust
/// use relay_config::Config;
/// use relayd::telemetry;
///
/// # fn main() -> Result<(), relayd::telemetry::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config, None)?;
/// let second = telemetry::initialise(&config, None)?;
/// drop(first);
/// drop(second);
/// # Ok(())
/// # }
/// ```
pub fn initialise(
    config: &Config,
    console: Option<ConsoleHandle>,
) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config, console))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config, console: Option<ConsoleHandle>) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
    };
    let console_layer = console.map(ConsoleLayer::new);

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(
            builder(filter)
                .json()
                .flatten_event(true)
                .finish()
                .with(console_layer),
        ),
        LogFormat::Compact => Box::new(builder(filter).compact().finish().with(console_layer)),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
