use std::process::ExitCode;

use relay_config::ConfigError;
use relayd::{BootstrapError, LaunchError};

fn main() -> ExitCode {
    match relayd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(LaunchError::Bootstrap {
            source:
                BootstrapError::Configuration {
                    source: ConfigError::Arguments(error),
                },
        }) => error.exit(),
        Err(error) => {
            eprintln!("relayd: {error}");
            ExitCode::FAILURE
        }
    }
}
