//! Banner serving policy.
//!
//! Non-admin reads that accept eventual consistency are answered from the
//! cache and fall back to the durable store on a miss or a cache failure.
//! Admin reads and reads that ask for the last revision always go to the
//! durable store. Writes go to the durable store first and are mirrored into
//! the cache on a best-effort basis.

use std::sync::Arc;

use banners_storage::{
    Banner, BannerFilter, CacheError, DynBannerCache, DynBannerStore, FeatureFilter, NewBanner,
    StorageError,
};
use chrono::{DateTime, SubsecRound, Utc};
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors surfaced by [`BannerService`]. Cache failures never appear here.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("banner not found")]
    NotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("persistence error: {0}")]
    Persistence(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => ServiceError::NotFound,
            StorageError::InvalidBanner { message } => ServiceError::InvalidInput(message),
            other => ServiceError::Persistence(other),
        }
    }
}

/// A failed refresh cycle.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("loading banners failed: {0}")]
    Store(#[from] StorageError),
    #[error("caching banner {banner_id} failed: {source}")]
    Cache {
        banner_id: i64,
        #[source]
        source: CacheError,
    },
}

/// A read against the banner catalog.
#[derive(Debug, Clone, Default)]
pub struct GetBannersRequest {
    pub feature: FeatureFilter,
    /// Tag filter for the durable store; the first tag addresses the cache.
    pub tag_ids: Vec<i32>,
    pub is_admin: bool,
    pub use_last_revision: bool,
    pub offset: u32,
    pub limit: u32,
}

impl GetBannersRequest {
    /// `(feature, tag)` pair to look up in the cache, if this read may use it.
    fn cache_key(&self) -> Option<(i32, i32)> {
        if self.is_admin || self.use_last_revision {
            return None;
        }
        match (self.feature, self.tag_ids.first()) {
            (FeatureFilter::Only(feature), Some(tag)) => Some((feature, *tag)),
            _ => None,
        }
    }

    fn to_filter(&self) -> BannerFilter {
        BannerFilter::new(self.feature)
            .with_tags(self.tag_ids.clone())
            .only_active(!self.is_admin)
            .with_offset(self.offset)
            .with_limit(self.limit)
    }
}

/// Decides per request whether to read from the cache or the durable store.
pub struct BannerService {
    store: DynBannerStore,
    cache: DynBannerCache,
}

impl BannerService {
    pub fn new(store: DynBannerStore, cache: DynBannerCache) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &DynBannerStore {
        &self.store
    }

    pub fn cache(&self) -> &DynBannerCache {
        &self.cache
    }

    /// Returns the banners matching `request`.
    ///
    /// A cache hit yields exactly one banner. Otherwise the durable store
    /// returns the full matching page.
    pub async fn get_banners(&self, request: &GetBannersRequest) -> Result<Vec<Banner>, ServiceError> {
        if let Some((feature_id, tag_id)) = request.cache_key() {
            match self.cache.get(feature_id, tag_id).await {
                Ok(banner) => {
                    debug!(feature_id, tag_id, banner_id = banner.id, "cache hit");
                    return Ok(vec![banner]);
                }
                Err(CacheError::NotFound { .. }) => {
                    debug!(feature_id, tag_id, "cache miss");
                }
                Err(e) => {
                    warn!(feature_id, tag_id, error = %e, "cache read failed, using store");
                }
            }
        }

        Ok(self.store.query(&request.to_filter()).await?)
    }

    /// Returns one banner for `(feature_id, tag_id)`, picked uniformly at
    /// random when several match.
    ///
    /// Inactive banners are hidden from non-admins, so they read as
    /// `NotFound`.
    pub async fn get_one_banner(
        &self,
        feature_id: i32,
        tag_id: i32,
        is_admin: bool,
        use_last_revision: bool,
    ) -> Result<Banner, ServiceError> {
        let request = GetBannersRequest {
            feature: FeatureFilter::Only(feature_id),
            tag_ids: vec![tag_id],
            is_admin,
            use_last_revision,
            ..Default::default()
        };
        let banners = self.get_banners(&request).await?;
        let picked = banners.choose(&mut rand::thread_rng()).cloned();
        picked.ok_or(ServiceError::NotFound)
    }

    /// Persists a new banner and mirrors it into the cache.
    #[instrument(skip_all, fields(feature_id = banner.feature_id))]
    pub async fn create_banner(&self, banner: NewBanner) -> Result<Banner, ServiceError> {
        let banner = banner.validate()?;
        let now = now();
        let id = self.store.create(&banner, now, now).await?;
        let created = Banner::from_new(id, banner, now, now);
        info!(banner_id = id, "banner created");

        if let Err(e) = self.cache.put(&created).await {
            warn!(banner_id = id, error = %e, "mirroring new banner into cache failed");
        }
        Ok(created)
    }

    /// Replaces the mutable fields of banner `id`.
    ///
    /// The cached copy is left as is until it expires or the next refresh.
    #[instrument(skip(self, banner))]
    pub async fn update_banner(&self, id: i64, banner: NewBanner) -> Result<(), ServiceError> {
        let banner = banner.validate()?;
        self.store.update(id, &banner, now()).await?;
        info!(banner_id = id, "banner updated");
        Ok(())
    }

    /// Deletes banner `id`, then drops its cached payload.
    #[instrument(skip(self))]
    pub async fn delete_banner(&self, id: i64) -> Result<(), ServiceError> {
        self.store.delete(id).await?;
        info!(banner_id = id, "banner deleted");

        match self.cache.delete(id).await {
            Ok(()) | Err(CacheError::NotFound { .. }) => {}
            Err(e) => warn!(banner_id = id, error = %e, "evicting deleted banner failed"),
        }
        Ok(())
    }

    /// Copies the whole catalog, active and inactive, into the cache.
    ///
    /// Stops at the first failed write; the next cycle converges.
    pub async fn refresh_cache(&self) -> Result<usize, RefreshError> {
        let banners = self.store.query(&BannerFilter::all()).await?;
        for banner in &banners {
            self.cache
                .put(banner)
                .await
                .map_err(|source| RefreshError::Cache {
                    banner_id: banner.id,
                    source,
                })?;
        }
        Ok(banners.len())
    }

    /// Releases the durable store's connections.
    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}

/// Shared handle used by request handlers and the refresh loop.
pub type SharedBannerService = Arc<BannerService>;

/// Current time at the durable store's precision.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
