//! Inbound command requests.
//!
//! A request is named by its URL path: `/create_object?x=1` and
//! `/Create-Object/` both name the `create-object` command.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use super::errors::CommandError;

/// Header carrying the shared secret.
pub const TOKEN_HEADER: &str = "x-ai-token";

/// Normalised request handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    name: String,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl CommandRequest {
    /// Builds a request from a raw URL path, header pairs and body bytes.
    ///
    /// Header names are stored lower-cased; the first occurrence wins.
    pub fn new<I, K, V>(path: &str, headers: I, body: Vec<u8>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in headers {
            map.entry(key.as_ref().to_ascii_lowercase())
                .or_insert_with(|| value.into());
        }
        Self {
            name: command_name(path),
            headers: map,
            body,
        }
    }

    /// Normalised command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Token presented by the client, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.header(TOKEN_HEADER)
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Derives a command name from a URL path.
#[must_use]
pub fn command_name(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_matches('/').to_ascii_lowercase().replace('_', "-")
}

/// Parses a command body into its typed shape.
///
/// An empty or whitespace-only body is read as `{}` so commands whose fields
/// are all optional accept a bare request.
///
/// # Errors
///
/// Returns [`CommandError::MalformedBody`] when the body is not JSON or does
/// not match `T`.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, CommandError> {
    let trimmed = body.trim_ascii();
    let source: &[u8] = if trimmed.is_empty() { b"{}" } else { trimmed };
    serde_json::from_slice(source).map_err(CommandError::from_json_error)
}
