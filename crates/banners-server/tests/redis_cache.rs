//! Redis cache tests against a real server.
//!
//! Run with `cargo test -p banners-server --test redis_cache -- --ignored`
//! (Docker required).

use std::time::Duration;

use banners_server::{RedisBannerCache, RedisConfig};
use banners_storage::{Banner, BannerCache, CacheError, ConnectRetry, NewBanner};
use chrono::Utc;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::redis::Redis;

async fn start(ttl: Duration) -> (ContainerAsync<Redis>, RedisBannerCache) {
    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start Redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get port");

    let config = RedisConfig {
        enabled: true,
        url: format!("redis://localhost:{port}"),
        pool_size: 4,
        ..Default::default()
    };
    let cache = RedisBannerCache::connect(&config, ttl, ConnectRetry::default())
        .await
        .expect("Failed to connect");
    (container, cache)
}

fn banner(id: i64, feature: i32, tags: &[i32], active: bool) -> Banner {
    let now = Utc::now();
    Banner::from_new(
        id,
        NewBanner::new(feature, tags.to_vec()).with_active(active),
        now,
        now,
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_put_get_delete() {
    let (_container, cache) = start(Duration::from_secs(60)).await;
    cache.ping().await.unwrap();

    let b = banner(1, 5, &[1, 2], true);
    cache.put(&b).await.unwrap();

    assert_eq!(cache.get(5, 1).await.unwrap(), b);
    assert_eq!(cache.get(5, 2).await.unwrap(), b);
    assert!(matches!(cache.get(5, 3).await, Err(CacheError::NotFound { .. })));
    assert!(matches!(cache.get(6, 1).await, Err(CacheError::NotFound { .. })));

    cache.delete(1).await.unwrap();
    assert!(matches!(cache.get(5, 1).await, Err(CacheError::NotFound { .. })));
    assert!(matches!(cache.delete(1).await, Err(CacheError::NotFound { .. })));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_inactive_entries_are_skipped() {
    let (_container, cache) = start(Duration::from_secs(60)).await;

    cache.put(&banner(1, 5, &[2], false)).await.unwrap();
    assert!(matches!(cache.get(5, 2).await, Err(CacheError::NotFound { .. })));

    let active = banner(2, 5, &[2], true);
    cache.put(&active).await.unwrap();
    for _ in 0..10 {
        assert_eq!(cache.get(5, 2).await.unwrap().id, 2);
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_payload_expires() {
    let (_container, cache) = start(Duration::from_secs(1)).await;

    cache.put(&banner(1, 5, &[2], true)).await.unwrap();
    assert!(cache.get(5, 2).await.is_ok());

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert!(matches!(cache.get(5, 2).await, Err(CacheError::NotFound { .. })));

    // Refreshing re-establishes the payload under the surviving index.
    cache.put(&banner(1, 5, &[2], true)).await.unwrap();
    assert_eq!(cache.get(5, 2).await.unwrap().id, 1);
}
