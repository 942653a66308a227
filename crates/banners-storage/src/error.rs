//! Storage error types for the banner storage abstraction layer.
//!
//! [`StorageError`] covers the durable store; [`CacheError`] covers the cache
//! store. They are kept apart because the serving policy treats them very
//! differently: durable-store failures are surfaced, cache failures never are.

use std::fmt;

/// Errors that can occur during durable store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No row matched.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// What was looked up ("banner", "user").
        entity: String,
        /// The key that matched nothing.
        key: String,
    },

    /// A unique constraint rejected the write.
    #[error("{entity} already exists: {key}")]
    AlreadyExists {
        /// What was written ("user").
        entity: String,
        /// The conflicting key.
        key: String,
    },

    /// The banner data is invalid.
    #[error("Invalid banner: {message}")]
    InvalidBanner {
        /// Description of why the banner is invalid.
        message: String,
    },

    /// Begin, commit or rollback failed.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },

    /// Failed to connect to the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(entity: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /// Creates a new `InvalidBanner` error.
    #[must_use]
    pub fn invalid_banner(message: impl Into<String>) -> Self {
        Self::InvalidBanner {
            message: message.into(),
        }
    }

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
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

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Category recorded in the `category` field when the error is logged.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidBanner { .. } => ErrorCategory::Validation,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Transaction,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Errors that can occur during cache store operations.
///
/// Never surfaced to callers of the serving policy; a cache error always
/// degrades to a durable-store read or a logged no-op.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No active, resolvable entry for the key.
    #[error("cache entry not found: {key}")]
    NotFound {
        /// The cache key that resolved to nothing.
        key: String,
    },

    /// The cache backend (connection, command) failed.
    #[error("cache backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl fmt::Display) -> Self {
        Self::Backend {
            message: message.to_string(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
