//! Shared configuration for the relay command server.
//!
//! Values are layered with the usual precedence: built-in defaults, then
//! `RELAY_*` environment variables, then command-line flags. Paths that
//! default relative to the project root are resolved once during loading so
//! every consumer sees the same absolute layout.

use std::env;
use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgAction, Parser};
use thiserror::Error;

mod defaults;
mod endpoint;
mod logging;
pub mod token;

pub use defaults::{
    DEFAULT_GENERATED_DIR, DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_MEMORY_DIR, DEFAULT_PORT,
    DEFAULT_TOKEN_ENV, FALLBACK_TOKEN, default_log_filter_string,
    default_log_format,
};
pub use endpoint::{EndpointParseError, ListenEndpoint, default_listen_literal};
pub use logging::{LogFormat, LogFormatParseError};
pub use token::{ResolvedToken, TokenOrigin, TokenSource, default_token_sources, resolve_token};

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "relayd",
    version,
    about = "Local automation command server for a single-threaded host"
)]
pub struct Config {
    /// Loopback URL the command server listens on.
    #[arg(long, env = "RELAY_LISTEN", default_value_t = ListenEndpoint::default())]
    pub listen: ListenEndpoint,
    /// Root of the host project; relative defaults hang off this directory.
    #[arg(long, env = "RELAY_PROJECT_ROOT")]
    pub project_root: Option<Utf8PathBuf>,
    /// Directory holding journals, the KV file and the project index.
    #[arg(long, env = "RELAY_MEMORY_DIR")]
    pub memory_dir: Option<Utf8PathBuf>,
    /// Whitelisted root for `write-file`.
    #[arg(long, env = "RELAY_GENERATED_DIR")]
    pub generated_dir: Option<Utf8PathBuf>,
    /// Environment variable consulted first for the auth token.
    #[arg(long, env = "RELAY_TOKEN_ENV", default_value = DEFAULT_TOKEN_ENV)]
    pub token_env: String,
    /// Tracing filter expression.
    #[arg(long, env = "RELAY_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
    /// Log output format (`json` or `compact`).
    #[arg(long, env = "RELAY_LOG_FORMAT", default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
    /// Commit the project with git after each successful mutating command.
    #[arg(long, env = "RELAY_AUTO_COMMIT", action = ArgAction::SetTrue)]
    pub auto_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenEndpoint::default(),
            project_root: None,
            memory_dir: None,
            generated_dir: None,
            token_env: DEFAULT_TOKEN_ENV.to_owned(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            auto_commit: false,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when flags or environment values fail to
    /// parse, or when the working directory cannot be determined.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(env::args_os())
    }

    /// Loads configuration from an explicit argument iterator.
    ///
    /// The first item is treated as the binary name, mirroring
    /// [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or path resolution fails.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let parsed = Self::try_parse_from(args).map_err(ConfigError::Arguments)?;
        parsed.resolved()
    }

    /// Fills in path defaults relative to the project root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkingDirectory`] when no project root was
    /// configured and the current directory is unavailable or not UTF-8.
    pub fn resolved(mut self) -> Result<Self, ConfigError> {
        let root = match self.project_root.take() {
            Some(root) => root,
            None => current_dir()?,
        };
        if self.memory_dir.is_none() {
            self.memory_dir = Some(defaults::default_memory_dir(&root));
        }
        if self.generated_dir.is_none() {
            self.generated_dir = Some(defaults::default_generated_dir(&root));
        }
        self.project_root = Some(root);
        Ok(self)
    }

    /// Configuration rooted at `root`, with every path defaulted beneath it.
    #[must_use]
    pub fn for_project(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        Self {
            memory_dir: Some(defaults::default_memory_dir(&root)),
            generated_dir: Some(defaults::default_generated_dir(&root)),
            project_root: Some(root),
            ..Self::default()
        }
    }

    /// Endpoint to bind.
    #[must_use]
    pub fn listen(&self) -> &ListenEndpoint {
        &self.listen
    }

    /// Project root; `.` until [`Config::resolved`] has run.
    #[must_use]
    pub fn project_root(&self) -> &Utf8Path {
        self.project_root.as_deref().unwrap_or(Utf8Path::new("."))
    }

    /// Memory directory.
    #[must_use]
    pub fn memory_dir(&self) -> Utf8PathBuf {
        self.memory_dir
            .clone()
            .unwrap_or_else(|| self.project_root().join(defaults::DEFAULT_MEMORY_DIR))
    }

    /// Whitelisted generated-code root.
    #[must_use]
    pub fn generated_dir(&self) -> Utf8PathBuf {
        self.generated_dir
            .clone()
            .unwrap_or_else(|| self.project_root().join(defaults::DEFAULT_GENERATED_DIR))
    }

    /// Configured tracing filter.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Whether git auto-commit is enabled.
    #[must_use]
    pub const fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Ordered token sources derived from [`Config::token_env`].
    ///
    /// [`Config::token_env`]: Config#structfield.token_env
    #[must_use]
    pub fn token_sources(&self) -> Vec<TokenSource> {
        default_token_sources(&self.token_env)
    }
}

fn current_dir() -> Result<Utf8PathBuf, ConfigError> {
    let dir = env::current_dir().map_err(ConfigError::WorkingDirectory)?;
    Utf8PathBuf::from_path_buf(dir).map_err(|path| ConfigError::NonUtf8Path {
        path: path.display().to_string(),
    })
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line or environment values failed to parse.
    #[error("invalid configuration: {0}")]
    Arguments(#[source] clap::Error),
    /// The working directory could not be read.
    #[error("failed to read working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
    /// A path was not valid UTF-8.
    #[error("path '{path}' is not valid UTF-8")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },
}

impl ConfigError {
    /// True when clap asked to print help or version output.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Self::Arguments(error) if matches!(
                error.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hang_off_project_root() {
        let config = Config::for_project("/work/game");
        assert_eq!(config.memory_dir(), Utf8PathBuf::from("/work/game/.relay/memory"));
        assert_eq!(
            config.generated_dir(),
            Utf8PathBuf::from("/work/game/Assets/Generated")
        );
        assert_eq!(config.listen().port(), DEFAULT_PORT);
    }

    #[test]
    fn explicit_paths_override_defaults() {
        let config = Config::load_from_iter([
            "relayd",
            "--project-root",
            "/work/game",
            "--memory-dir",
            "/var/relay",
        ])
        .expect("load");
        assert_eq!(config.memory_dir(), Utf8PathBuf::from("/var/relay"));
        assert_eq!(
            config.generated_dir(),
            Utf8PathBuf::from("/work/game/Assets/Generated")
        );
    }

    #[test]
    fn rejects_non_loopback_listen_address() {
        let error = Config::load_from_iter(["relayd", "--listen", "http://10.0.0.5:17890"])
            .expect_err("routable address must be rejected");
        assert!(matches!(error, ConfigError::Arguments(_)));
    }
}
