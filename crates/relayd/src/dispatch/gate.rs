//! Kill switch and shared-secret check applied to every request.

use relay_config::{ResolvedToken, TokenOrigin};

use super::errors::CommandError;

/// Global enable flag plus the expected token.
#[derive(Debug, Clone)]
pub struct Gate {
    enabled: bool,
    token: ResolvedToken,
}

impl Gate {
    /// Enabled gate expecting `token`.
    #[must_use]
    pub const fn new(token: ResolvedToken) -> Self {
        Self {
            enabled: true,
            token,
        }
    }

    /// Admits or denies a request.
    ///
    /// The kill switch is checked before the token, so a disabled server
    /// answers `disabled` even to unauthenticated callers. No command is
    /// exempt.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Disabled`] or [`CommandError::Unauthorized`].
    pub fn check(&self, presented: Option<&str>) -> Result<(), CommandError> {
        if !self.enabled {
            return Err(CommandError::Disabled);
        }
        match presented {
            Some(token) if token.as_bytes() == self.token.value().as_bytes() => Ok(()),
            _ => Err(CommandError::Unauthorized),
        }
    }

    /// Current state of the kill switch.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flips the kill switch.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Replaces the expected token.
    pub fn set_token(&mut self, token: ResolvedToken) {
        self.token = token;
    }

    /// Where the current token came from.
    #[must_use]
    pub const fn token_origin(&self) -> TokenOrigin {
        self.token.origin()
    }
}
