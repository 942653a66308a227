//! Transaction completion shared by the banner and user stores.
//!
//! A `PgTransaction` dropped without commit or rollback issues ROLLBACK, so a
//! cancelled operation never leaks an open transaction.

use std::fmt::Display;

use sqlx_postgres::{PgPool, PgTransaction};

use crate::error::PostgresError;

/// Begins a transaction on `pool`.
pub(crate) async fn begin(pool: &PgPool, op: &str) -> Result<PgTransaction<'static>, PostgresError> {
    pool.begin()
        .await
        .map_err(|e| PostgresError::transaction(format!("{op} begin error: {e}")))
}

/// Commits on success and rolls back on failure.
///
/// If the rollback itself fails the returned error names both causes.
pub(crate) async fn commit_or_rollback<T, E>(
    tx: PgTransaction<'_>,
    result: Result<T, E>,
    op: &str,
) -> Result<T, E>
where
    E: Display + From<PostgresError>,
{
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| PostgresError::transaction(format!("{op} commit error: {e}")))?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback_err) => {
                tracing::error!(op, error = %err, rollback_error = %rollback_err, "rollback failed");
                Err(rollback_failed(op, &err, &rollback_err).into())
            }
        },
    }
}

/// Error for an operation whose rollback also failed. Names both causes.
fn rollback_failed(op: &str, cause: &dyn Display, rollback_err: &dyn Display) -> PostgresError {
    PostgresError::transaction(format!("{op} error: {cause}; rollback error: {rollback_err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use banners_storage::StorageError;

    #[test]
    fn test_rollback_failure_keeps_both_causes() {
        let cause = StorageError::not_found("banner", 7);
        let err = rollback_failed("delete", &cause, &"connection reset");
        assert_eq!(
            err.to_string(),
            "Transaction error: delete error: banner not found: 7; rollback error: connection reset"
        );

        let storage: StorageError = err.into();
        assert!(matches!(storage, StorageError::TransactionError { .. }));
        assert!(storage.to_string().contains("rollback error: connection reset"));
    }
}
