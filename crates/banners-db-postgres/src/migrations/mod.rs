//! Database migration management for the PostgreSQL storage backend.
//!
//! Migrations are embedded in the binary so the gateway can bring the schema
//! up to date before it accepts traffic.

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use sqlx_postgres::PgPool;
use std::borrow::Cow;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// Embedded migrations in chronological order: (version, description, sql).
macro_rules! embedded_migrations {
    () => {
        &[
            (
                20240410000001i64,
                "banners",
                include_str!("../../migrations/20240410000001_banners.sql"),
            ),
            (
                20240410000002i64,
                "users",
                include_str!("../../migrations/20240410000002_users.sql"),
            ),
        ]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Runs all pending database migrations.
///
/// Applied versions are tracked in `_sqlx_migrations`; concurrent starters
/// serialize on the migrator's advisory lock.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running database migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(e.to_string()))?;

    info!("Database migrations completed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered() {
        let migrations = build_migrations();
        assert_eq!(migrations.len(), 2);
        assert!(migrations.windows(2).all(|w| w[0].version < w[1].version));
        assert!(migrations[0].sql.contains("CREATE TABLE IF NOT EXISTS banners"));
        assert!(migrations[1].sql.contains("CREATE TABLE IF NOT EXISTS users"));
    }
}
