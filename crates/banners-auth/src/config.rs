//! Authentication configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Token signing configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// secret = "change-me"
/// token_ttl_secs = 86400
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for HS256 tokens.
    pub secret: String,

    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl AuthConfig {
    /// Creates a configuration with the given secret and the default lifetime.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Sets the token lifetime.
    #[must_use]
    pub fn with_token_ttl_secs(mut self, secs: u64) -> Self {
        self.token_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.trim().is_empty() {
            return Err("auth.secret must not be empty".into());
        }
        if self.token_ttl_secs == 0 {
            return Err("auth.token_ttl_secs must be > 0".into());
        }
        Ok(())
    }
}
