//! Error taxonomy for command dispatch.
//!
//! Every failure a command can produce maps onto one HTTP status and one
//! envelope message. Denials from the gate carry their own status codes;
//! domain failures are reported with a `200` error envelope so drivers can
//! tell "the command ran and said no" apart from transport problems.

use std::io;

use thiserror::Error;

use crate::host::HostError;
use crate::memory::MemoryError;

/// Errors surfaced while gating, resolving or executing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Missing or mismatched token.
    #[error("unauthorized")]
    Unauthorized,

    /// The kill switch is off.
    #[error("disabled")]
    Disabled,

    /// No built-in or registered handler matches the name.
    #[error("unknown route: {name}")]
    UnknownRoute { name: String },

    /// The body did not match the command's expected shape.
    #[error("invalid request body: {message}")]
    MalformedBody {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A referenced object, type or file does not exist.
    #[error("{message}")]
    NotFound { message: String },

    /// Arguments were well-formed but unacceptable.
    #[error("{message}")]
    Validation { message: String },

    /// `write-file` target escapes the generated-code root.
    #[error("path outside allowed folder")]
    PathOutsideRoot,

    /// Filesystem failure while serving a command.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Unexpected failure, including a panicking handler.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CommandError {
    /// HTTP status code used when this error is returned to a client.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Disabled => 503,
            Self::Internal { .. } => 500,
            Self::UnknownRoute { .. }
            | Self::MalformedBody { .. }
            | Self::NotFound { .. }
            | Self::Validation { .. }
            | Self::PathOutsideRoot
            | Self::Io(_) => 200,
        }
    }

    /// Creates a malformed-body error from a serde failure.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedBody {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed-body error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBody {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unknown-route error.
    pub fn unknown_route(name: impl Into<String>) -> Self {
        Self::UnknownRoute { name: name.into() }
    }

    /// Creates a not-found error with the message shown to clients verbatim.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a validation error with the message shown to clients verbatim.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<HostError> for CommandError {
    fn from(error: HostError) -> Self {
        match error {
            HostError::NotFound(message) => Self::NotFound { message },
            HostError::Invalid(message) | HostError::Failed(message) => {
                Self::Validation { message }
            }
            HostError::Io(source) => Self::Io(source),
        }
    }
}

impl From<MemoryError> for CommandError {
    fn from(error: MemoryError) -> Self {
        match error {
            MemoryError::InvalidStream { .. } => Self::validation(error.to_string()),
            MemoryError::Io { source, .. } => Self::Io(source),
            MemoryError::Corrupt { .. } | MemoryError::Serialize(_) => {
                Self::internal(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(CommandError::Unauthorized, 401)]
    #[case(CommandError::Disabled, 503)]
    #[case(CommandError::internal("boom"), 500)]
    #[case(CommandError::unknown_route("nope"), 200)]
    #[case(CommandError::not_found("gameobject not found: /A"), 200)]
    #[case(CommandError::PathOutsideRoot, 200)]
    fn status_codes_follow_error_class(#[case] error: CommandError, #[case] status: u16) {
        assert_eq!(error.http_status(), status);
    }

    #[test]
    fn domain_messages_pass_through_unchanged() {
        let error = CommandError::from(HostError::NotFound(String::from("type not found: Foo")));
        assert_eq!(error.to_string(), "type not found: Foo");
        assert_eq!(
            CommandError::unknown_route("frobnicate").to_string(),
            "unknown route: frobnicate"
        );
    }
}
