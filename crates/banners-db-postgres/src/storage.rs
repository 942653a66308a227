//! PostgreSQL implementation of the BannerStore trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_postgres::PgPool;
use tracing::{debug, info};

use banners_storage::{Banner, BannerFilter, BannerStore, ConnectRetry, NewBanner, StorageError};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;
use crate::queries::banners;
use crate::transaction::{begin, commit_or_rollback};

/// PostgreSQL durable store for banners.
#[derive(Debug, Clone)]
pub struct PostgresBannerStore {
    pool: PgPool,
}

impl PostgresBannerStore {
    /// Connects, retrying per `retry`, and runs migrations if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection could be established within the
    /// retry budget or if migrations fail.
    pub async fn connect(config: &PostgresConfig, retry: ConnectRetry) -> Result<Self, StorageError> {
        let pool = pool::create_pool(config, retry).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        info!("PostgreSQL banner store ready");
        Ok(Self { pool })
    }

    /// Creates a store from an existing connection pool.
    ///
    /// Migrations are not run automatically when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BannerStore for PostgresBannerStore {
    async fn create(
        &self,
        banner: &NewBanner,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut tx = begin(&self.pool, "create").await?;
        let result = banners::insert(&mut tx, banner, created_at, updated_at).await;
        let id = commit_or_rollback(tx, result, "create").await?;
        debug!(banner_id = id, "banner inserted");
        Ok(id)
    }

    async fn update(
        &self,
        id: i64,
        banner: &NewBanner,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut tx = begin(&self.pool, "update").await?;
        let result = banners::update(&mut tx, id, banner, updated_at).await;
        commit_or_rollback(tx, result, "update").await
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        let mut tx = begin(&self.pool, "delete").await?;
        let result = banners::delete(&mut tx, id).await;
        commit_or_rollback(tx, result, "delete").await
    }

    async fn get(&self, id: i64) -> Result<Option<Banner>, StorageError> {
        let mut tx = begin(&self.pool, "get").await?;
        let result = banners::get(&mut tx, id).await;
        commit_or_rollback(tx, result, "get").await
    }

    async fn query(&self, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
        let mut tx = begin(&self.pool, "query").await?;
        let result = banners::select(&mut tx, filter).await;
        commit_or_rollback(tx, result, "query").await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        pool::test_connection(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
