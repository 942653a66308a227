//! HS256 JWT issuance and validation.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::storage::UserRole;
use crate::AuthResult;

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub role: UserRole,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
}

impl Claims {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Service for encoding and decoding JWT tokens.
///
/// This service is thread-safe (`Send + Sync`) and can be shared across
/// async tasks.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Creates a new JWT service from the configured secret and lifetime.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs: i64::try_from(config.token_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issues a token for `username` with `role`, valid for the configured
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue(&self, username: &str, role: UserRole) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: username.to_string(),
            role,
            exp: now.saturating_add(self.ttl_secs),
            iat: now,
        };
        self.encode(&claims)
    }

    /// Encodes claims into a JWT string.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| crate::AuthError::internal(format!("token encoding failed: {e}")))
    }

    /// Decodes and validates a JWT string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` for an expired token and
    /// `AuthError::InvalidToken` for anything else that does not verify.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
