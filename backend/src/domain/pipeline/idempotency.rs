//! Deduplication stage keyed by the invocation's idempotency key.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::Value;
use tracing::{debug, warn};

use super::{CommandContext, CommitParticipant, Middleware, Next};
use crate::domain::ports::{
    IdempotencyMetricLabels, IdempotencyMetrics, IdempotencyStore, IdempotencyStoreError,
};
use crate::domain::{ClaimId, Error, IdempotencyKey, IdempotencyRecord, StartOutcome, Transaction};

const KEY_FIELD: &str = "idempotencyKey";

/// Claims the idempotency key before the inner stages run.
///
/// | Claim outcome | Behaviour |
/// |---|---|
/// | new key | run inner stages; on success the finished record commits with the handler's writes, on failure its claim is released |
/// | started, not expired | fail with `duplicate_in_progress` |
/// | finished, same payload | replay the stored result; the handler does not run |
/// | finished, different payload | fail with `conflict` on `idempotencyKey` |
///
/// Store failures surface as `service_unavailable`.
pub struct IdempotencyMiddleware {
    store: Arc<dyn IdempotencyStore>,
    metrics: Arc<dyn IdempotencyMetrics>,
    clock: Arc<dyn Clock>,
}

impl IdempotencyMiddleware {
    /// Deduplicate through `store`, reporting outcomes to `metrics`.
    #[must_use]
    pub fn new(
        store: Arc<dyn IdempotencyStore>,
        metrics: Arc<dyn IdempotencyMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            metrics,
            clock,
        }
    }

    fn existing_labels(
        &self,
        command: &str,
        record: &IdempotencyRecord,
    ) -> IdempotencyMetricLabels {
        IdempotencyMetricLabels::existing(command, self.clock.utc() - record.created_at)
    }

    async fn run_claimed(
        &self,
        ctx: &mut CommandContext,
        next: Next<'_>,
        key: IdempotencyKey,
        claim: ClaimId,
    ) -> Result<Value, Error> {
        if let Err(err) = self
            .metrics
            .record_miss(&IdempotencyMetricLabels::miss(ctx.command_name()))
            .await
        {
            warn!(error = %err, "failed to record idempotency miss");
        }

        ctx.enlist(Box::new(RecordCompletion {
            store: Arc::clone(&self.store),
            key: key.clone(),
            claim,
        }));

        match next.run(ctx).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if let Err(release_err) = self.store.release(&key, claim).await {
                    warn!(
                        idempotency_key = %key,
                        error = %release_err,
                        "failed to release idempotency key; it stays blocked until expiry"
                    );
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Middleware for IdempotencyMiddleware {
    fn name(&self) -> &'static str {
        "idempotency"
    }

    fn requires_transaction(&self) -> bool {
        true
    }

    async fn process(&self, ctx: &mut CommandContext, next: Next<'_>) -> Result<Value, Error> {
        let key = ctx.idempotency_key().clone();
        let payload_hash = *ctx.payload_hash();
        let command = ctx.command_name();

        let outcome = self
            .store
            .try_start(&key, &payload_hash)
            .await
            .map_err(store_unavailable)?;

        match outcome {
            StartOutcome::Started(claim) => self.run_claimed(ctx, next, key, claim).await,
            StartOutcome::InProgress(record) => {
                if let Err(err) = self
                    .metrics
                    .record_in_progress(&self.existing_labels(command, &record))
                    .await
                {
                    warn!(error = %err, "failed to record idempotency in-progress duplicate");
                }
                debug!(command, idempotency_key = %key, "duplicate command still in progress");
                Err(Error::duplicate_in_progress(format!(
                    "command {command} with this idempotency key is already in progress"
                ))
                .with_field(KEY_FIELD))
            }
            StartOutcome::Finished(record) if record.payload_hash != payload_hash => {
                if let Err(err) = self
                    .metrics
                    .record_conflict(&self.existing_labels(command, &record))
                    .await
                {
                    warn!(error = %err, "failed to record idempotency conflict");
                }
                Err(Error::conflict(
                    "idempotency key was already used with a different payload",
                )
                .with_field(KEY_FIELD))
            }
            StartOutcome::Finished(record) => {
                if let Err(err) = self
                    .metrics
                    .record_hit(&self.existing_labels(command, &record))
                    .await
                {
                    warn!(error = %err, "failed to record idempotency hit");
                }
                debug!(command, idempotency_key = %key, "replaying stored result");
                ctx.mark_replayed();
                record.result.ok_or_else(|| {
                    Error::internal(format!("finished idempotency record {key} has no result"))
                })
            }
        }
    }
}

/// Marks the claimed key finished inside the invocation's transaction.
struct RecordCompletion {
    store: Arc<dyn IdempotencyStore>,
    key: IdempotencyKey,
    claim: ClaimId,
}

#[async_trait]
impl CommitParticipant for RecordCompletion {
    async fn prepare(&self, tx: &mut Transaction, result: &Value) -> Result<(), Error> {
        self.store
            .finish(tx, &self.key, self.claim, result)
            .await
            .map_err(store_unavailable)
    }
}

fn store_unavailable(err: IdempotencyStoreError) -> Error {
    Error::service_unavailable(format!("idempotency store unavailable: {err}"))
}
