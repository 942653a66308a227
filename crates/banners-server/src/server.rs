use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::{
    Router,
    routing::{get, patch, post},
};
use banners_auth::{AuthService, DynUserStorage};
use banners_db_memory::InMemoryUserStorage;
use banners_db_postgres::{PostgresBannerStore, PostgresUserStorage};
use banners_storage::DynBannerStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::bootstrap::bootstrap_admin_user;
use crate::cache::create_banner_cache;
use crate::config::{AppConfig, StorageBackend};
use crate::handlers;
use crate::refresh::spawn_refresh_loop;
use crate::service::{BannerService, SharedBannerService};

/// State shared by every handler.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: SharedBannerService,
    pub auth: Arc<AuthService>,
}

/// Connects the durable store, the cache and the user accounts, and creates
/// the bootstrap admin.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let (store, users): (DynBannerStore, DynUserStorage) = match cfg.storage.backend {
        StorageBackend::Postgres => {
            let store = PostgresBannerStore::connect(&cfg.storage.postgres, cfg.connect_retry)
                .await
                .context("PostgreSQL initialization failed")?;
            let users = PostgresUserStorage::new(store.pool().clone());
            (Arc::new(store), Arc::new(users))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            (
                banners_db_memory::create_banner_store(),
                Arc::new(InMemoryUserStorage::new()),
            )
        }
    };

    let cache = create_banner_cache(&cfg.redis, cfg.cache_ttl(), cfg.connect_retry)
        .await
        .context("Redis initialization failed")?;

    let auth = Arc::new(AuthService::new(users, &cfg.auth));
    bootstrap_admin_user(&auth, &cfg.bootstrap)
        .await
        .context("admin bootstrap failed")?;

    tracing::info!(
        store = store.backend_name(),
        cache = cache.backend_name(),
        "Storage initialized"
    );

    Ok(AppState {
        service: Arc::new(BannerService::new(store, cache)),
        auth,
    })
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            cfg.request_timeout(),
        ))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/user_banner", get(handlers::user_banner))
        .route(
            "/banner",
            get(handlers::list_banners).post(handlers::create_banner),
        )
        .route(
            "/banner/{id}",
            patch(handlers::update_banner).delete(handlers::delete_banner),
        )
        .route("/auth", post(handlers::login))
        .route("/user", post(handlers::create_user))
        .with_state(state)
        .layer(middleware)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<BannersServer> {
        let state = build_state(&self.config).await?;
        Ok(BannersServer {
            addr: self.addr,
            app: build_app(state.clone(), &self.config),
            service: state.service,
            refresh_interval: self.config.cache_ttl(),
            shutdown_grace: self.config.shutdown_grace(),
        })
    }
}

pub struct BannersServer {
    addr: SocketAddr,
    app: Router,
    service: SharedBannerService,
    refresh_interval: Duration,
    shutdown_grace: Duration,
}

impl BannersServer {
    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serves on `listener` until `shutdown` resolves.
    ///
    /// Shutdown order: stop accepting, drain in-flight requests for at most
    /// the grace period, stop the refresh loop, close the durable store.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!("listening on {addr}");

        let refresh_cancel = CancellationToken::new();
        let refresh = spawn_refresh_loop(
            self.service.clone(),
            self.refresh_interval,
            refresh_cancel.clone(),
        );

        let app = self.app;
        let stop = CancellationToken::new();
        let serve_stop = stop.clone();
        let mut serving = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { serve_stop.cancelled().await })
                .await
        });

        let finished_early = tokio::select! {
            res = &mut serving => Some(res),
            _ = shutdown => None,
        };
        stop.cancel();

        let outcome = match finished_early {
            Some(res) => res,
            None => match tokio::time::timeout(self.shutdown_grace, &mut serving).await {
                Ok(res) => res,
                Err(_) => {
                    tracing::warn!(
                        grace_ms = self.shutdown_grace.as_millis() as u64,
                        "shutdown grace period elapsed, dropping in-flight requests"
                    );
                    serving.abort();
                    Ok(Ok(()))
                }
            },
        };

        refresh_cancel.cancel();
        if let Err(e) = refresh.await {
            tracing::error!(error = %e, "refresh loop ended abnormally");
        }

        self.service.shutdown().await;
        tracing::info!("server stopped");

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(anyhow::anyhow!("server task failed: {e}")),
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use banners_auth::AuthConfig;
    use banners_storage::{Banner, BannerFilter, BannerStore, NewBanner, StorageError};
    use chrono::{DateTime, Utc};
    use tower::ServiceExt;

    use crate::cache::LocalBannerCache;

    /// Store whose reads take longer than any request deadline.
    struct SlowStore;

    #[async_trait]
    impl BannerStore for SlowStore {
        async fn create(
            &self,
            _: &NewBanner,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<i64, StorageError> {
            Ok(1)
        }
        async fn update(&self, _: i64, _: &NewBanner, _: DateTime<Utc>) -> Result<(), StorageError> {
            Ok(())
        }
        async fn delete(&self, _: i64) -> Result<(), StorageError> {
            Ok(())
        }
        async fn get(&self, _: i64) -> Result<Option<Banner>, StorageError> {
            Ok(None)
        }
        async fn query(&self, _: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
        async fn ping(&self) -> Result<(), StorageError> {
            Ok(())
        }
        async fn close(&self) {}
        fn backend_name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn slow_request_times_out_with_408() {
        let mut cfg = AppConfig::default();
        cfg.server.request_timeout_ms = 50;

        let auth = Arc::new(AuthService::new(
            Arc::new(InMemoryUserStorage::new()),
            &AuthConfig::new("timeout-secret"),
        ));
        auth.ensure_admin("admin", "pw").await.unwrap();
        let token = auth.login("admin", "pw").await.unwrap();

        let state = AppState {
            service: Arc::new(BannerService::new(
                Arc::new(SlowStore),
                Arc::new(LocalBannerCache::new(Duration::from_secs(60))),
            )),
            auth,
        };
        let app = build_app(state, &cfg);

        let request = Request::builder()
            .uri("/banner?feature_id=1")
            .header(handlers::TOKEN_HEADER, token)
            .body(Body::empty())
            .unwrap();
        let response = tokio::time::timeout(Duration::from_secs(5), app.oneshot(request))
            .await
            .expect("timeout layer did not fire")
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
