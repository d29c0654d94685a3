//! Periodic deletion of idempotency records past their retention window.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::IdempotencyConfig;
use super::ports::{IdempotencyStore, IdempotencyStoreError};

/// Deletes idempotency records older than the configured retention.
///
/// Records are removed whatever their status, so a key whose first attempt
/// crashed mid-flight becomes claimable again once the window passes.
#[derive(Clone)]
pub struct IdempotencySweeper {
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyConfig,
}

impl IdempotencySweeper {
    /// Sweep `store` according to `config`.
    #[must_use]
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }

    /// Run one sweep and return how many records were deleted.
    ///
    /// # Errors
    ///
    /// Returns the store error when the deletion fails.
    pub async fn sweep_once(&self) -> Result<u64, IdempotencyStoreError> {
        let deleted = self.store.delete_expired(self.config.retention()).await?;
        if deleted > 0 {
            info!(
                deleted,
                retention_secs = self.config.retention().as_secs(),
                "swept expired idempotency records"
            );
        } else {
            debug!("no expired idempotency records to sweep");
        }
        Ok(deleted)
    }

    /// Sweep immediately and then every `sweep_interval` until the task is
    /// aborted. Failed sweeps are logged and retried on the next tick.
    #[must_use = "dropping the handle detaches the sweeper; keep it to abort on shutdown"]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(err) = self.sweep_once().await {
                    warn!(error = %err, "idempotency retention sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::ports::MockIdempotencyStore;

    #[tokio::test]
    async fn sweep_once_uses_configured_retention() {
        let mut store = MockIdempotencyStore::new();
        store
            .expect_delete_expired()
            .withf(|max_age| *max_age == Duration::from_secs(12 * 3600))
            .times(1)
            .returning(|_| Ok(3));
        let sweeper = IdempotencySweeper::new(
            Arc::new(store),
            IdempotencyConfig::from_hours(12, 60),
        );

        assert_eq!(sweeper.sweep_once().await.expect("sweep"), 3);
    }

    #[tokio::test]
    async fn sweep_once_surfaces_store_errors() {
        let mut store = MockIdempotencyStore::new();
        store
            .expect_delete_expired()
            .returning(|_| Err(IdempotencyStoreError::query("locked")));
        let sweeper = IdempotencySweeper::new(Arc::new(store), IdempotencyConfig::default());

        assert!(sweeper.sweep_once().await.is_err());
    }

    #[tokio::test]
    async fn spawned_sweeper_runs_immediately_and_survives_failures() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut store = MockIdempotencyStore::new();
        store.expect_delete_expired().returning(move |_| {
            tx.send(()).unwrap_or_default();
            Err(IdempotencyStoreError::connection("down"))
        });
        let sweeper = IdempotencySweeper::new(
            Arc::new(store),
            IdempotencyConfig::from_hours(48, 1),
        );

        let handle = sweeper.spawn();
        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("sweep should run")
                .expect("channel open");
        }
        handle.abort();
    }
}
