//! # banners-storage
//!
//! Storage abstraction layer for the banners service.
//!
//! This crate defines the types and traits shared by the durable store
//! backends and the cache backends. It does not contain any implementations -
//! those are provided by separate crates (`banners-db-postgres`,
//! `banners-db-memory`) and by the server's cache module.
//!
//! ## Overview
//!
//! - [`BannerStore`]: the durable, authoritative store (create, update,
//!   delete, filtered query).
//! - [`BannerCache`]: the derived, time-bounded cache keyed by
//!   `(feature, tag)`.
//! - [`connect_with_backoff`]: the retry discipline every store driver uses
//!   for its initial connection.
//!
//! ## Example
//!
//! ```ignore
//! use banners_storage::{BannerFilter, BannerStore, FeatureFilter, StorageError};
//!
//! async fn active_for_tag(
//!     store: &dyn BannerStore,
//!     feature: i32,
//!     tag: i32,
//! ) -> Result<Vec<Banner>, StorageError> {
//!     let filter = BannerFilter::new(FeatureFilter::Only(feature))
//!         .with_tags(vec![tag])
//!         .only_active(true);
//!     store.query(&filter).await
//! }
//! ```

mod connect;
mod error;
mod traits;
mod types;

pub use connect::{ConnectRetry, connect_with_backoff};
pub use error::{CacheError, ErrorCategory, StorageError};
pub use traits::{BannerCache, BannerStore};
pub use types::{Banner, BannerFilter, FeatureFilter, NewBanner, index_key, payload_key};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable durable store.
pub type DynBannerStore = std::sync::Arc<dyn BannerStore>;

/// Type alias for a shareable cache.
pub type DynBannerCache = std::sync::Arc<dyn BannerCache>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use banners_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{CacheError, ErrorCategory, StorageError};
    pub use crate::traits::{BannerCache, BannerStore};
    pub use crate::types::{Banner, BannerFilter, FeatureFilter, NewBanner};
    pub use crate::{DynBannerCache, DynBannerStore, StorageResult};
}
