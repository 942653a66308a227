use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use banners_storage::{Banner, BannerFilter, BannerStore, NewBanner, StorageError};

/// In-memory banner store using a concurrent hash map.
///
/// IDs are assigned from a monotonically increasing counter starting at 1,
/// like a `BIGSERIAL` column.
#[derive(Debug)]
pub struct InMemoryBannerStore {
    data: DashMap<i64, Banner>,
    next_id: AtomicI64,
}

impl Default for InMemoryBannerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBannerStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored banners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl BannerStore for InMemoryBannerStore {
    async fn create(
        &self,
        banner: &NewBanner,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.data
            .insert(id, Banner::from_new(id, banner.clone(), created_at, updated_at));
        Ok(id)
    }

    async fn update(
        &self,
        id: i64,
        banner: &NewBanner,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut stored = self
            .data
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("banner", id))?;

        stored.feature_id = banner.feature_id;
        stored.tag_ids = banner.tag_ids.clone();
        stored.is_active = banner.is_active;
        stored.content = banner.content.clone();
        stored.updated_at = updated_at;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        self.data
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("banner", id))
    }

    async fn get(&self, id: i64) -> Result<Option<Banner>, StorageError> {
        Ok(self.data.get(&id).map(|entry| entry.value().clone()))
    }

    async fn query(&self, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
        let mut matched: Vec<Banner> = self
            .data
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_unstable_by_key(|b| b.id);

        let page = matched.into_iter().skip(filter.offset as usize);
        Ok(match filter.limit_opt() {
            Some(limit) => page.take(limit as usize).collect(),
            None => page.collect(),
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) {}

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
