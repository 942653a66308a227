//! In-memory storage backend for the banners service.
//!
//! This crate provides in-memory implementations of the `BannerStore` trait
//! from `banners-storage` and the `UserStorage` trait from `banners-auth`,
//! using DashMap for concurrent access. Filtering, ordering and pagination
//! follow the PostgreSQL backend so the two are interchangeable in tests.
//!
//! # Example
//!
//! ```ignore
//! use banners_db_memory::InMemoryBannerStore;
//! use banners_storage::{BannerStore, NewBanner};
//!
//! let store = InMemoryBannerStore::new();
//! let now = chrono::Utc::now();
//! let id = store.create(&NewBanner::new(5, vec![1]), now, now).await?;
//! ```

pub mod storage;
pub mod users;

// Re-export the storage traits for convenience
pub use banners_storage::{BannerStore, StorageError};

pub use storage::InMemoryBannerStore;
pub use users::InMemoryUserStorage;

/// Creates a new in-memory banner store behind the trait object.
pub fn create_banner_store() -> banners_storage::DynBannerStore {
    std::sync::Arc::new(InMemoryBannerStore::new())
}
