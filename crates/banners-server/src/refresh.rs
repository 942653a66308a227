//! Background cache refresh.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::SharedBannerService;

/// Starts the refresh loop in a background task.
///
/// The first cycle runs immediately, later ones every `period`. Cancelling
/// `cancel` aborts the cycle in flight and ends the task.
pub fn spawn_refresh_loop(
    service: SharedBannerService,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "cache refresh loop started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("refresh cycle cancelled");
                    break;
                }
                result = service.refresh_cache() => match result {
                    Ok(count) => debug!(banners = count, "cache refreshed"),
                    Err(e) => warn!(error = %e, "cache refresh failed"),
                }
            }
        }

        info!("cache refresh loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use banners_db_memory::InMemoryBannerStore;
    use banners_storage::{Banner, BannerCache, BannerFilter, BannerStore, NewBanner, StorageError};
    use chrono::{DateTime, Utc};
    use tokio::sync::Notify;

    use crate::cache::LocalBannerCache;
    use crate::service::BannerService;

    #[tokio::test(start_paused = true)]
    async fn runs_at_start_and_on_interval() {
        let store = Arc::new(InMemoryBannerStore::new());
        let cache = Arc::new(LocalBannerCache::new(Duration::from_secs(30)));
        let service = Arc::new(BannerService::new(store.clone(), cache.clone()));

        let now = Utc::now();
        let first = store
            .create(&NewBanner::new(5, vec![1]), now, now)
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_refresh_loop(service, Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get(5, 1).await.unwrap().id, first);

        let second = store
            .create(&NewBanner::new(6, vec![1]), now, now)
            .await
            .unwrap();
        assert!(cache.get(6, 1).await.is_err());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cache.get(6, 1).await.unwrap().id, second);
        assert_eq!(cache.get(5, 1).await.unwrap().id, first);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let service = Arc::new(BannerService::new(
            Arc::new(InMemoryBannerStore::new()),
            Arc::new(LocalBannerCache::new(Duration::from_secs(30))),
        ));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let handle = spawn_refresh_loop(service, Duration::from_secs(30), cancel);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }

    /// Store whose catalog scan never completes.
    #[derive(Default)]
    struct StalledStore {
        scanning: Notify,
    }

    #[async_trait]
    impl BannerStore for StalledStore {
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
            self.scanning.notify_one();
            std::future::pending().await
        }
        async fn ping(&self) -> Result<(), StorageError> {
            Ok(())
        }
        async fn close(&self) {}
        fn backend_name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn cancelling_aborts_cycle_in_flight() {
        let store = Arc::new(StalledStore::default());
        let service = Arc::new(BannerService::new(
            store.clone(),
            Arc::new(LocalBannerCache::new(Duration::from_secs(30))),
        ));
        let cancel = CancellationToken::new();
        let handle = spawn_refresh_loop(service, Duration::from_secs(30), cancel.clone());

        tokio::time::timeout(Duration::from_secs(1), store.scanning.notified())
            .await
            .expect("first cycle did not start");
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop mid-cycle")
            .unwrap();
    }
}
