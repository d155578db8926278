//! Precedence between defaults, environment variables and flags.

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard};

use camino::Utf8PathBuf;
use once_cell::sync::Lazy;
use rstest::rstest;

use relay_config::{Config, DEFAULT_PORT, LogFormat};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &str) -> Self {
        let guard = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::env::var_os(key);
        // Serialised by ENV_MUTEX; `Drop` restores the previous value.
        unsafe { std::env::set_var(key, OsStr::new(value)) };
        Self {
            key,
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

#[rstest]
fn defaults_apply_without_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let config =
        Config::load_from_iter(["relayd", "--project-root", "/srv/game"]).expect("load config");
    assert_eq!(config.listen().port(), DEFAULT_PORT);
    assert_eq!(config.log_format(), LogFormat::Json);
    assert!(!config.auto_commit());
}

#[rstest]
fn environment_overrides_defaults() {
    let _format = EnvOverride::set_var("RELAY_LOG_FORMAT", "compact");
    let config =
        Config::load_from_iter(["relayd", "--project-root", "/srv/game"]).expect("load config");
    assert_eq!(config.log_format(), LogFormat::Compact);
}

#[rstest]
fn flags_override_environment() {
    let _listen = EnvOverride::set_var("RELAY_LISTEN", "http://127.0.0.1:4000");
    let config = Config::load_from_iter([
        "relayd",
        "--project-root",
        "/srv/game",
        "--listen",
        "http://127.0.0.1:5000",
    ])
    .expect("load config");
    assert_eq!(config.listen().port(), 5000);
}

#[rstest]
fn memory_dir_tracks_project_root() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let config =
        Config::load_from_iter(["relayd", "--project-root", "/srv/game"]).expect("load config");
    assert_eq!(
        config.memory_dir(),
        Utf8PathBuf::from("/srv/game/.relay/memory")
    );
}
