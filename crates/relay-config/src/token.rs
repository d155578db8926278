//! Auth token resolution.
//!
//! The token is resolved once at startup by walking an ordered list of
//! sources and taking the first one that yields a non-empty value. The
//! process environment wins, followed by a per-user token file, a
//! machine-wide token file, and finally a fixed fallback literal so the
//! server always has *some* token to compare against.

use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::defaults::FALLBACK_TOKEN;

#[cfg(unix)]
const MACHINE_TOKEN_PATH: &str = "/etc/relay/token";

/// A single place the auth token may be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Environment variable of the running process.
    ProcessEnv(String),
    /// Token file owned by the current user.
    UserFile(PathBuf),
    /// Token file shared by every user on the machine.
    MachineFile(PathBuf),
    /// Literal used when every other source is empty.
    Fallback(String),
}

impl TokenSource {
    /// Value offered by this source. File contents lose surrounding
    /// whitespace such as a trailing newline; other values are kept byte for
    /// byte. Blank values count as absent.
    fn read(&self) -> Option<String> {
        let value = match self {
            Self::ProcessEnv(name) => env::var(name).ok()?,
            Self::UserFile(path) | Self::MachineFile(path) => {
                fs::read_to_string(path).ok()?.trim().to_owned()
            }
            Self::Fallback(value) => value.clone(),
        };
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    const fn origin(&self) -> TokenOrigin {
        match self {
            Self::ProcessEnv(_) => TokenOrigin::ProcessEnv,
            Self::UserFile(_) => TokenOrigin::UserFile,
            Self::MachineFile(_) => TokenOrigin::MachineFile,
            Self::Fallback(_) => TokenOrigin::Fallback,
        }
    }
}

/// Which kind of source produced the resolved token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    /// Process environment variable.
    ProcessEnv,
    /// Per-user token file.
    UserFile,
    /// Machine-wide token file.
    MachineFile,
    /// Fallback literal.
    Fallback,
    /// Replaced at runtime by an admin action.
    Admin,
}

impl fmt::Display for TokenOrigin {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ProcessEnv => "process_env",
            Self::UserFile => "user_file",
            Self::MachineFile => "machine_file",
            Self::Fallback => "fallback",
            Self::Admin => "admin",
        };
        formatter.write_str(label)
    }
}

/// Token value paired with the source that produced it.
///
/// `Debug` redacts the value so the token never lands in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    value: String,
    origin: TokenOrigin,
}

impl ResolvedToken {
    /// Wraps an explicit token, e.g. one supplied by an admin action.
    #[must_use]
    pub fn explicit(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: TokenOrigin::Admin,
        }
    }

    /// The token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consumes the wrapper and returns the token value.
    #[must_use]
    pub fn into_value(self) -> String {
        self.value
    }

    /// The source that produced the value.
    #[must_use]
    pub const fn origin(&self) -> TokenOrigin {
        self.origin
    }

    /// True when no configured source produced a value.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.origin == TokenOrigin::Fallback
    }
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResolvedToken")
            .field("value", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}

/// Ordered token sources for the given environment variable name.
#[must_use]
pub fn default_token_sources(env_var: &str) -> Vec<TokenSource> {
    let mut sources = vec![TokenSource::ProcessEnv(env_var.to_owned())];
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("relay");
        dir.push("token");
        sources.push(TokenSource::UserFile(dir));
    }
    #[cfg(unix)]
    sources.push(TokenSource::MachineFile(PathBuf::from(MACHINE_TOKEN_PATH)));
    sources.push(TokenSource::Fallback(FALLBACK_TOKEN.to_owned()));
    sources
}

/// Walks `sources` in order and returns the first non-empty value.
///
/// Falls back to [`FALLBACK_TOKEN`] when the list is exhausted without a
/// hit, so callers never have to handle an absent token.
#[must_use]
pub fn resolve_token(sources: &[TokenSource]) -> ResolvedToken {
    sources
        .iter()
        .find_map(|source| {
            source.read().map(|value| ResolvedToken {
                value,
                origin: source.origin(),
            })
        })
        .unwrap_or_else(|| ResolvedToken {
            value: FALLBACK_TOKEN.to_owned(),
            origin: TokenOrigin::Fallback,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_empty_source_wins() {
        let dir = tempfile::tempdir().expect("temp dir");
        let user = dir.path().join("user-token");
        let machine = dir.path().join("machine-token");
        fs::write(&user, "  \n").expect("write blank user token");
        fs::write(&machine, "machine-secret\n").expect("write machine token");

        let sources = vec![
            TokenSource::ProcessEnv(String::from("RELAY_TEST_TOKEN_THAT_IS_NEVER_SET")),
            TokenSource::UserFile(user),
            TokenSource::MachineFile(machine),
            TokenSource::Fallback(String::from("fallback")),
        ];

        let token = resolve_token(&sources);
        assert_eq!(token.value(), "machine-secret");
        assert_eq!(token.origin(), TokenOrigin::MachineFile);
    }

    #[test]
    fn environment_value_is_kept_verbatim() {
        let name = "RELAY_TOKEN_VERBATIM_UNIT_TEST";
        // Unique to this test; nothing else reads it.
        unsafe { env::set_var(name, " padded-secret ") };
        let token = resolve_token(&[TokenSource::ProcessEnv(name.to_owned())]);
        unsafe { env::remove_var(name) };
        assert_eq!(token.value(), " padded-secret ");
        assert_eq!(token.origin(), TokenOrigin::ProcessEnv);
    }

    #[test]
    fn missing_files_fall_through_to_literal() {
        let sources = vec![
            TokenSource::UserFile(PathBuf::from("/nonexistent/relay/token")),
            TokenSource::Fallback(String::from("literal")),
        ];
        let token = resolve_token(&sources);
        assert_eq!(token.value(), "literal");
        assert!(token.is_fallback());
    }

    #[test]
    fn empty_source_list_uses_builtin_fallback() {
        let token = resolve_token(&[]);
        assert_eq!(token.value(), FALLBACK_TOKEN);
        assert!(token.is_fallback());
    }

    #[test]
    fn default_sources_start_with_process_env_and_end_with_fallback() {
        let sources = default_token_sources("SOME_VAR");
        assert_eq!(
            sources.first(),
            Some(&TokenSource::ProcessEnv(String::from("SOME_VAR")))
        );
        assert_eq!(
            sources.last(),
            Some(&TokenSource::Fallback(FALLBACK_TOKEN.to_owned()))
        );
    }

    #[test]
    fn debug_output_redacts_value() {
        let token = ResolvedToken::explicit("super-secret");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
