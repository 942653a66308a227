//! Banner cache backends.
//!
//! ## Layout
//!
//! ```text
//! banner:{id}                  -> JSON banner, expires after the TTL
//! feature:{feature}:tag:{tag}  -> set of banner ids, never expires
//! ```
//!
//! Index sets only grow from the write path. A member whose payload has
//! expired, was deleted, or no longer serves the `(feature, tag)` pair is
//! skipped on read; the refresh loop repopulates payloads.
//!
//! ## Backends
//!
//! - **Redis**: shared across instances, used when `redis.enabled = true`
//! - **Local (DashMap)**: per-instance, used otherwise and in tests

pub mod local;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use banners_storage::{Banner, CacheError, ConnectRetry, DynBannerCache};

use crate::config::RedisConfig;

pub use self::local::{CachedEntry, LocalBannerCache};
pub use self::redis::RedisBannerCache;

/// Creates the banner cache selected by the configuration.
///
/// With Redis enabled the initial connection is retried per `retry`, and
/// failure is returned rather than degraded to the local cache.
pub async fn create_banner_cache(
    config: &RedisConfig,
    ttl: Duration,
    retry: ConnectRetry,
) -> Result<DynBannerCache, CacheError> {
    if !config.enabled {
        tracing::info!(ttl_secs = ttl.as_secs(), "Redis disabled, using local banner cache");
        return Ok(Arc::new(LocalBannerCache::new(ttl)));
    }

    let cache = RedisBannerCache::connect(config, ttl, retry).await?;
    Ok(Arc::new(cache))
}

/// Decodes a cached payload and keeps it only if it is an active banner
/// addressed by `(feature_id, tag_id)`.
pub(crate) fn servable(payload: &[u8], feature_id: i32, tag_id: i32) -> Option<Banner> {
    match serde_json::from_slice::<Banner>(payload) {
        Ok(banner) if banner.is_active && banner.serves(feature_id, tag_id) => Some(banner),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(feature_id, tag_id, error = %e, "skipping undecodable cache payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banners_storage::NewBanner;
    use chrono::Utc;

    fn encoded(feature: i32, tags: &[i32], active: bool) -> Vec<u8> {
        let now = Utc::now();
        let banner = Banner::from_new(
            1,
            NewBanner::new(feature, tags.to_vec()).with_active(active),
            now,
            now,
        );
        serde_json::to_vec(&banner).unwrap()
    }

    #[test]
    fn servable_filters_payloads() {
        assert!(servable(&encoded(5, &[1, 2], true), 5, 2).is_some());
        assert!(servable(&encoded(5, &[1, 2], false), 5, 2).is_none());
        assert!(servable(&encoded(3, &[1, 2], true), 5, 2).is_none());
        assert!(servable(b"{not json", 5, 2).is_none());
    }

    #[tokio::test]
    async fn disabled_redis_uses_local_cache() {
        let cache = create_banner_cache(
            &RedisConfig::default(),
            Duration::from_secs(60),
            ConnectRetry::default(),
        )
        .await
        .unwrap();
        assert_eq!(cache.backend_name(), "local");
        cache.ping().await.unwrap();
    }
}
