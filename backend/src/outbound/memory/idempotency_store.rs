//! Process-local idempotency store.
//!
//! One mutex guards the whole record map, so claiming a key is a single
//! check-and-insert under the lock: exactly one concurrent caller observes
//! [`StartOutcome::Started`] for a given key. Finishing and releasing only
//! touch a record still owned by the caller's [`ClaimId`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::ports::{IdempotencyStore, IdempotencyStoreError};
use crate::domain::{
    ClaimId, IdempotencyConfig, IdempotencyKey, IdempotencyRecord, IdempotencyStatus,
    PayloadHash, StartOutcome, Transaction,
};

type Records = HashMap<IdempotencyKey, IdempotencyRecord>;

/// In-memory [`IdempotencyStore`].
///
/// Records expire `retention` after they were claimed. An expired record no
/// longer blocks or replays; the sweeper deletes it later.
#[derive(Clone)]
pub struct InMemoryIdempotencyStore {
    records: Arc<Mutex<Records>>,
    clock: Arc<dyn Clock>,
    retention: TimeDelta,
}

impl InMemoryIdempotencyStore {
    /// Create an empty store using `config` for record expiry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, config: &IdempotencyConfig) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            clock,
            retention: TimeDelta::from_std(config.retention()).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Number of records currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .map(|records| records.len())
            .unwrap_or_default()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>, IdempotencyStoreError> {
        self.records
            .lock()
            .map_err(|_| IdempotencyStoreError::query("idempotency record lock poisoned"))
    }

    fn expiry_for(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at
            .checked_add_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn try_start(
        &self,
        key: &IdempotencyKey,
        payload_hash: &PayloadHash,
    ) -> Result<StartOutcome, IdempotencyStoreError> {
        let now = self.clock.utc();
        let mut records = self.lock()?;

        if let Some(existing) = records.get(key).filter(|record| !record.is_expired_at(now)) {
            return Ok(match existing.status {
                IdempotencyStatus::Started => StartOutcome::InProgress(existing.clone()),
                IdempotencyStatus::Finished => StartOutcome::Finished(existing.clone()),
            });
        }

        let record =
            IdempotencyRecord::started(key.clone(), *payload_hash, now, self.expiry_for(now));
        let claim = record.claim;
        records.insert(key.clone(), record);
        debug!(idempotency_key = %key, %claim, "claimed idempotency key");
        Ok(StartOutcome::Started(claim))
    }

    async fn finish(
        &self,
        tx: &mut Transaction,
        key: &IdempotencyKey,
        claim: ClaimId,
        result: &Value,
    ) -> Result<(), IdempotencyStoreError> {
        let owned = self
            .lock()?
            .get(key)
            .is_some_and(|record| record.is_started_by(claim));
        if !owned {
            return Err(IdempotencyStoreError::not_started(key.as_ref()));
        }

        let records = Arc::clone(&self.records);
        let key = key.clone();
        let result = result.clone();
        tx.stage(move || {
            let mut records = records.lock().unwrap_or_else(PoisonError::into_inner);
            match records.get_mut(&key) {
                Some(record) if record.is_started_by(claim) => {
                    *record = record.finished(result);
                }
                _ => warn!(
                    idempotency_key = %key,
                    %claim,
                    "idempotency key was reclaimed before commit; result not stored"
                ),
            }
        });
        Ok(())
    }

    async fn release(
        &self,
        key: &IdempotencyKey,
        claim: ClaimId,
    ) -> Result<(), IdempotencyStoreError> {
        let mut records = self.lock()?;
        if records.get(key).is_some_and(|record| record.is_started_by(claim)) {
            records.remove(key);
            debug!(idempotency_key = %key, %claim, "released idempotency key");
        } else {
            debug!(idempotency_key = %key, %claim, "claim no longer holds key; nothing released");
        }
        Ok(())
    }

    async fn find(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn delete_expired(&self, max_age: Duration) -> Result<u64, IdempotencyStoreError> {
        let max_age = TimeDelta::from_std(max_age)
            .map_err(|err| IdempotencyStoreError::query(format!("invalid max age: {err}")))?;
        let cutoff = self
            .clock
            .utc()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, record| record.created_at >= cutoff);
        let deleted = (before - records.len()) as u64;

        debug!(deleted, cutoff = %cutoff, "cleaned up expired idempotency records");
        Ok(deleted)
    }
}
