//! In-process banner cache with the same layout as the Redis cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use banners_storage::{Banner, BannerCache, CacheError, index_key, payload_key};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use tokio::time::Instant;

use super::servable;

/// A cached payload with TTL support.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Banner cache backed by two concurrent maps.
///
/// Payload entries expire after the TTL; index sets never do.
#[derive(Debug)]
pub struct LocalBannerCache {
    payloads: DashMap<String, CachedEntry>,
    index: DashMap<String, HashSet<i64>>,
    ttl: Duration,
}

impl LocalBannerCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            payloads: DashMap::new(),
            index: DashMap::new(),
            ttl,
        }
    }

    /// Banner ids indexed under `(feature_id, tag_id)`, including stale ones.
    pub fn index_members(&self, feature_id: i32, tag_id: i32) -> HashSet<i64> {
        self.index
            .get(&index_key(feature_id, tag_id))
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// Unexpired payload of banner `id`.
    fn payload(&self, id: i64) -> Option<Arc<Vec<u8>>> {
        let key = payload_key(id);
        let data = self
            .payloads
            .get(&key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| Arc::clone(&entry.data));
        if data.is_none() {
            self.payloads.remove_if(&key, |_, entry| entry.is_expired());
        }
        data
    }
}

#[async_trait]
impl BannerCache for LocalBannerCache {
    async fn put(&self, banner: &Banner) -> Result<(), CacheError> {
        let data = serde_json::to_vec(banner)?;
        self.payloads
            .insert(payload_key(banner.id), CachedEntry::new(data, self.ttl));
        for key in banner.index_keys() {
            self.index.entry(key).or_default().insert(banner.id);
        }
        Ok(())
    }

    async fn get(&self, feature_id: i32, tag_id: i32) -> Result<Banner, CacheError> {
        let key = index_key(feature_id, tag_id);
        let mut members: Vec<i64> = self
            .index
            .get(&key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        if members.is_empty() {
            return Err(CacheError::not_found(key));
        }

        members.shuffle(&mut rand::thread_rng());
        members
            .into_iter()
            .filter_map(|id| self.payload(id))
            .find_map(|data| servable(&data, feature_id, tag_id))
            .ok_or_else(|| CacheError::not_found(key))
    }

    async fn delete(&self, id: i64) -> Result<(), CacheError> {
        let key = payload_key(id);
        match self.payloads.remove(&key) {
            Some((_, entry)) if !entry.is_expired() => Ok(()),
            _ => Err(CacheError::not_found(key)),
        }
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banners_storage::NewBanner;
    use chrono::Utc;
    use serde_json::{Map, json};
    use std::collections::HashMap;

    fn banner(id: i64, feature: i32, tags: &[i32], active: bool, title: &str) -> Banner {
        let mut content = Map::new();
        content.insert("title".into(), json!(title));
        let now = Utc::now();
        Banner::from_new(
            id,
            NewBanner::new(feature, tags.to_vec())
                .with_active(active)
                .with_content(content),
            now,
            now,
        )
    }

    #[tokio::test]
    async fn put_indexes_every_tag() {
        let cache = LocalBannerCache::new(Duration::from_secs(60));
        cache.put(&banner(1, 5, &[1, 2, 3], true, "t")).await.unwrap();

        for tag in [1, 2, 3] {
            let hit = cache.get(5, tag).await.unwrap();
            assert_eq!(hit.id, 1);
            assert_eq!(hit.content["title"], "t");
        }
        assert!(cache.get(5, 4).await.unwrap_err().is_not_found());
        assert!(cache.get(6, 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn inactive_banners_are_not_served() {
        let cache = LocalBannerCache::new(Duration::from_secs(60));
        cache.put(&banner(1, 5, &[2], false, "off")).await.unwrap();
        assert!(cache.get(5, 2).await.unwrap_err().is_not_found());

        cache.put(&banner(2, 5, &[2], true, "on")).await.unwrap();
        for _ in 0..20 {
            assert_eq!(cache.get(5, 2).await.unwrap().id, 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn payloads_expire_but_index_stays() {
        let cache = LocalBannerCache::new(Duration::from_secs(10));
        cache.put(&banner(1, 5, &[2], true, "t")).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get(5, 2).await.is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(5, 2).await.unwrap_err().is_not_found());
        assert!(cache.index_members(5, 2).contains(&1));
        assert!(cache.delete(1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_leaves_index_members() {
        let cache = LocalBannerCache::new(Duration::from_secs(60));
        cache.put(&banner(1, 5, &[2], true, "t")).await.unwrap();

        cache.delete(1).await.unwrap();
        assert!(cache.delete(1).await.unwrap_err().is_not_found());
        assert!(cache.get(5, 2).await.unwrap_err().is_not_found());
        assert_eq!(cache.index_members(5, 2), HashSet::from([1]));
    }

    #[tokio::test]
    async fn moved_banner_is_not_served_under_old_key() {
        let cache = LocalBannerCache::new(Duration::from_secs(60));
        cache.put(&banner(1, 5, &[2], true, "t")).await.unwrap();
        cache.put(&banner(1, 7, &[2], true, "t")).await.unwrap();

        assert!(cache.index_members(5, 2).contains(&1));
        assert!(cache.get(5, 2).await.unwrap_err().is_not_found());
        assert_eq!(cache.get(7, 2).await.unwrap().feature_id, 7);
    }

    #[tokio::test]
    async fn pick_is_spread_over_matches() {
        let cache = LocalBannerCache::new(Duration::from_secs(60));
        for id in 1..=3 {
            cache.put(&banner(id, 5, &[2], true, "t")).await.unwrap();
        }

        let mut seen: HashMap<i64, usize> = HashMap::new();
        for _ in 0..300 {
            *seen.entry(cache.get(5, 2).await.unwrap().id).or_default() += 1;
        }
        assert_eq!(seen.len(), 3, "{seen:?}");
    }
}
