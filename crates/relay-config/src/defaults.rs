use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Loopback host the server binds to unless overridden.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port the command server listens on unless overridden.
pub const DEFAULT_PORT: u16 = 17890;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Environment variable consulted first when resolving the auth token.
pub const DEFAULT_TOKEN_ENV: &str = "AI_AUTOMATION_TOKEN";

/// Token used when no configured source yields a value.
pub const FALLBACK_TOKEN: &str = "CHANGE_ME";

/// Memory directory, relative to the project root.
pub const DEFAULT_MEMORY_DIR: &str = ".relay/memory";

/// Whitelisted root for self-extension writes, relative to the project root.
pub const DEFAULT_GENERATED_DIR: &str = "Assets/Generated";

/// Owned log filter value used where allocation is required.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Memory directory beneath the given project root.
#[must_use]
pub fn default_memory_dir(project_root: &Utf8PathBuf) -> Utf8PathBuf {
    project_root.join(DEFAULT_MEMORY_DIR)
}

/// Generated-code directory beneath the given project root.
#[must_use]
pub fn default_generated_dir(project_root: &Utf8PathBuf) -> Utf8PathBuf {
    project_root.join(DEFAULT_GENERATED_DIR)
}
