//! Storage traits for the banner storage abstraction layer.

use async_trait::async_trait;

use crate::error::{CacheError, StorageError};
use crate::types::{Banner, BannerFilter, NewBanner};

/// The durable, authoritative banner store.
///
/// Every mutation runs in its own transaction. Reads also run in a
/// transaction so a multi-row scan sees one snapshot. Implementations must be
/// thread-safe (`Send + Sync`); dropping an in-flight future must not leak the
/// transaction.
///
/// # Example
///
/// ```ignore
/// use banners_storage::{BannerStore, NewBanner};
///
/// async fn seed(store: &dyn BannerStore) -> Result<i64, StorageError> {
///     let now = chrono::Utc::now();
///     store.create(&NewBanner::new(5, vec![1, 2]), now, now).await
/// }
/// ```
#[async_trait]
pub trait BannerStore: Send + Sync {
    /// Persists a new banner and returns the generated ID.
    ///
    /// # Errors
    ///
    /// Returns a persistence error on constraint or connectivity failure.
    async fn create(
        &self,
        banner: &NewBanner,
        created_at: chrono::DateTime<chrono::Utc>,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<i64, StorageError>;

    /// Replaces the mutable fields (feature, tags, active, content,
    /// updated-at) of banner `id`. `created_at` is kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no row matched.
    async fn update(
        &self,
        id: i64,
        banner: &NewBanner,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StorageError>;

    /// Deletes banner `id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no row matched.
    async fn delete(&self, id: i64) -> Result<(), StorageError>;

    /// Reads a single banner by ID. Admin-only path.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing rows.
    async fn get(&self, id: i64) -> Result<Option<Banner>, StorageError>;

    /// Returns banners matching `filter`, ordered by ID ascending.
    async fn query(&self, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Releases connections. Called once at shutdown.
    async fn close(&self);

    /// Returns the name of the backend.
    fn backend_name(&self) -> &'static str;
}

/// The derived, time-bounded banner cache.
///
/// Payload entries expire after the configured TTL. Index sets keyed by
/// `(feature, tag)` never expire and are never cleaned on delete, so an index
/// may reference a banner whose payload is gone; readers treat such members
/// as "not currently cached" rather than as an error.
#[async_trait]
pub trait BannerCache: Send + Sync {
    /// Stores the banner payload with the TTL and adds its ID to the index
    /// set of every `(feature, tag)` pair it belongs to.
    async fn put(&self, banner: &Banner) -> Result<(), CacheError>;

    /// Returns one active banner addressed by `(feature, tag)`.
    ///
    /// Index members are visited in random, non-repeating order; members
    /// without a payload are skipped.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` if the index is empty or no member
    /// resolves to an active banner.
    async fn get(&self, feature_id: i32, tag_id: i32) -> Result<Banner, CacheError>;

    /// Removes the payload entry of banner `id`. Index entries are left alone.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` if the payload did not exist.
    async fn delete(&self, id: i64) -> Result<(), CacheError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Returns the name of the backend.
    fn backend_name(&self) -> &'static str;
}
