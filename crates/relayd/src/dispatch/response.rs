//! Response envelopes returned to clients.
//!
//! Every response body is one of two JSON shapes:
//!
//! ```json
//! {"status":"ok","data":"pong"}
//! {"status":"error","message":"unknown route: frobnicate"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::CommandError;

/// JSON body written for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    /// Command completed.
    Ok {
        /// Command-specific payload.
        data: Value,
    },
    /// Command was denied or failed.
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// Envelope paired with the HTTP status it travels under.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: u16,
    envelope: Envelope,
}

impl Reply {
    /// Successful reply carrying `data`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            status: 200,
            envelope: Envelope::Ok { data },
        }
    }

    /// Error reply with an explicit status.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope: Envelope::Error {
                message: message.into(),
            },
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Envelope body.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// True for an `ok` envelope.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.envelope, Envelope::Ok { .. })
    }

    /// Serialised body. Falls back to a fixed error envelope if `data` cannot
    /// be rendered, so the client never receives an empty body.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.envelope).unwrap_or_else(|_| {
            String::from(r#"{"status":"error","message":"failed to serialise response"}"#)
        })
    }
}

impl From<CommandError> for Reply {
    fn from(error: CommandError) -> Self {
        Self::error(error.http_status(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn ok_envelope_shape() {
        let reply = Reply::ok(json!("pong"));
        assert_eq!(reply.to_json(), r#"{"status":"ok","data":"pong"}"#);
        assert_eq!(reply.status(), 200);
    }

    #[test]
    fn error_envelope_carries_status_from_error() {
        let reply = Reply::from(CommandError::Disabled);
        assert_eq!(reply.status(), 503);
        assert_eq!(reply.to_json(), r#"{"status":"error","message":"disabled"}"#);
    }

    #[test]
    fn envelope_parses_back_for_clients() {
        let parsed: Envelope =
            serde_json::from_str(r#"{"status":"error","message":"no active scene"}"#)
                .expect("parse envelope");
        assert_eq!(
            parsed,
            Envelope::Error {
                message: String::from("no active scene")
            }
        );
    }
}
