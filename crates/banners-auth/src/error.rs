//! Authentication and authorization error types.

use std::fmt;

/// Errors that can occur during authentication and authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is malformed or its signature does not verify.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Unknown user or wrong password.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The caller is authenticated but lacks the required role.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// A user with this username already exists.
    #[error("User already exists: {username}")]
    UserExists {
        /// The conflicting username.
        username: String,
    },

    /// The request is missing a field or carries an invalid value.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// An error occurred while storing or retrieving users.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `UserExists` error.
    #[must_use]
    pub fn user_exists(username: impl Into<String>) -> Self {
        Self::UserExists {
            username: username.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Category recorded in the `category` field when the error is logged.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidToken { .. } | Self::TokenExpired | Self::InvalidCredentials => {
                ErrorCategory::Authentication
            }
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::UserExists { .. } => ErrorCategory::Conflict,
            Self::InvalidRequest { .. } => ErrorCategory::Client,
            Self::Storage { .. } | Self::Internal { .. } => ErrorCategory::Server,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::invalid_token(err.to_string()),
        }
    }
}

/// Categories of auth errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Conflict,
    Client,
    Server,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Conflict => write!(f, "conflict"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}
