pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod observability;
pub mod refresh;
pub mod server;
pub mod service;

pub use cache::{LocalBannerCache, RedisBannerCache, create_banner_cache};
pub use config::{AppConfig, CacheConfig, RedisConfig, ServerConfig, StorageBackend};
pub use observability::init_tracing;
pub use refresh::spawn_refresh_loop;
pub use server::{AppState, BannersServer, ServerBuilder, build_app, build_state, shutdown_signal};
pub use service::{BannerService, GetBannersRequest, RefreshError, ServiceError};
