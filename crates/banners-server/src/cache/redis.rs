//! Redis banner cache.

use std::time::Duration;

use async_trait::async_trait;
use banners_storage::{
    Banner, BannerCache, CacheError, ConnectRetry, connect_with_backoff, index_key, payload_key,
};
use deadpool_redis::{Connection, Pool};
use rand::seq::SliceRandom;
use redis::AsyncCommands;

use super::servable;
use crate::config::RedisConfig;

/// Banner cache shared by every instance through Redis.
///
/// `put` is a single `MULTI`/`EXEC` pipeline, so a payload and its index
/// memberships become visible together.
#[derive(Clone)]
pub struct RedisBannerCache {
    pool: Pool,
    ttl: Duration,
}

impl RedisBannerCache {
    pub fn new(pool: Pool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Builds the connection pool and waits until Redis answers `PING`.
    ///
    /// # Errors
    ///
    /// Returns the last failure once the retry budget is spent.
    pub async fn connect(
        config: &RedisConfig,
        ttl: Duration,
        retry: ConnectRetry,
    ) -> Result<Self, CacheError> {
        tracing::info!(url = %config.url, "Connecting to Redis");

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(CacheError::backend)?;
        let cache = Self::new(pool, ttl);

        connect_with_backoff("redis", retry, || cache.ping()).await?;
        tracing::info!(ttl_secs = ttl.as_secs(), "Connected to Redis");
        Ok(cache)
    }

    async fn conn(&self) -> Result<Connection, CacheError> {
        self.pool.get().await.map_err(CacheError::backend)
    }
}

#[async_trait]
impl BannerCache for RedisBannerCache {
    async fn put(&self, banner: &Banner) -> Result<(), CacheError> {
        let data = serde_json::to_vec(banner)?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(payload_key(banner.id), data, self.ttl.as_secs())
            .ignore();
        for key in banner.index_keys() {
            pipe.sadd(key, banner.id).ignore();
        }

        let mut conn = self.conn().await?;
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(CacheError::backend)
    }

    async fn get(&self, feature_id: i32, tag_id: i32) -> Result<Banner, CacheError> {
        let key = index_key(feature_id, tag_id);
        let mut conn = self.conn().await?;

        let mut members: Vec<i64> = conn.smembers(&key).await.map_err(CacheError::backend)?;
        if members.is_empty() {
            return Err(CacheError::not_found(key));
        }
        members.shuffle(&mut rand::thread_rng());

        for id in members {
            let payload: Option<Vec<u8>> = conn
                .get(payload_key(id))
                .await
                .map_err(CacheError::backend)?;
            if let Some(banner) = payload.and_then(|data| servable(&data, feature_id, tag_id)) {
                return Ok(banner);
            }
        }
        Err(CacheError::not_found(key))
    }

    async fn delete(&self, id: i64) -> Result<(), CacheError> {
        let key = payload_key(id);
        let mut conn = self.conn().await?;
        let removed: u64 = conn.del(&key).await.map_err(CacheError::backend)?;
        if removed == 0 {
            return Err(CacheError::not_found(key));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(CacheError::backend)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
