//! Error types for the PostgreSQL storage backend.

use banners_auth::AuthError;
use banners_storage::StorageError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for unique constraint violation (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is "unique violation" (23505).
pub fn is_unique_violation(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNIQUE_VIOLATION)
}

/// Errors specific to the PostgreSQL storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Begin, commit or rollback failed.
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// A stored row could not be mapped to a domain value.
    #[error("Row decode error: {message}")]
    Decode { message: String },
}

impl PostgresError {
    /// Creates a new transaction error.
    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates a new decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection_error(e.to_string()),
            PostgresError::Migration(e) => StorageError::internal(format!("Migration error: {e}")),
            PostgresError::Transaction { message } => StorageError::transaction_error(message),
            PostgresError::Decode { message } => StorageError::internal(message),
        }
    }
}

impl From<PostgresError> for AuthError {
    fn from(err: PostgresError) -> Self {
        AuthError::storage(err.to_string())
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::Migration("bad sql".into());
        assert!(err.to_string().contains("Migration error"));
    }

    #[test]
    fn test_conversion_to_storage_error() {
        let storage_err: StorageError = PostgresError::transaction("commit failed").into();
        assert!(matches!(storage_err, StorageError::TransactionError { .. }));

        let storage_err: StorageError = PostgresError::Migration("x".into()).into();
        assert!(matches!(storage_err, StorageError::Internal { .. }));
    }

    #[test]
    fn test_conversion_to_auth_error() {
        let auth_err: AuthError = PostgresError::decode("unknown role").into();
        assert!(matches!(auth_err, AuthError::Storage { .. }));
    }

    #[test]
    fn test_non_database_error_has_no_code() {
        assert!(!is_unique_violation(&SqlxError::RowNotFound));
    }
}
