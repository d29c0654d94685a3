//! Port abstraction for idempotency record persistence.
//!
//! The [`IdempotencyStore`] decides idempotency races: `try_start` must be a
//! single conditional write (insert-if-absent) so that exactly one concurrent
//! caller observes [`StartOutcome::Started`] for a key. The transition to
//! finished is staged in the caller's [`Transaction`] so it becomes durable
//! together with the business writes it describes.
//!
//! Completion and release carry the [`ClaimId`] returned by `try_start`. A
//! key whose record expired may have been claimed again, and only the current
//! claim may finish or release it.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    ClaimId, IdempotencyKey, IdempotencyRecord, PayloadHash, StartOutcome, Transaction,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by idempotency store adapters.
    pub enum IdempotencyStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "idempotency store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "idempotency store query failed: {message}",
        /// `finish` was called for a key the caller's claim no longer holds.
        NotStarted { key: String } => "idempotency key {key} is not started by this claim",
    }
}

/// Port for claiming, completing and expiring idempotency keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claim `key` for a command with `payload_hash`.
    ///
    /// Returns:
    /// - [`StartOutcome::Started`] when no live record existed; a started
    ///   record owned by the returned claim now exists.
    /// - [`StartOutcome::InProgress`] when a non-expired started record exists.
    /// - [`StartOutcome::Finished`] when a non-expired finished record exists.
    ///
    /// Expired records count as absent.
    async fn try_start(
        &self,
        key: &IdempotencyKey,
        payload_hash: &PayloadHash,
    ) -> Result<StartOutcome, IdempotencyStoreError>;

    /// Mark `key` finished with `result` as part of `tx`.
    ///
    /// Fails with `NotStarted` unless `claim` holds a started record for
    /// `key`. The record only changes once `tx` commits, and only if `claim`
    /// still holds it then.
    async fn finish(
        &self,
        tx: &mut Transaction,
        key: &IdempotencyKey,
        claim: ClaimId,
        result: &Value,
    ) -> Result<(), IdempotencyStoreError>;

    /// Delete the started record `claim` holds for `key`, so the key can be
    /// claimed again.
    ///
    /// Succeeds without deleting anything when the key is absent or held by
    /// another claim.
    async fn release(
        &self,
        key: &IdempotencyKey,
        claim: ClaimId,
    ) -> Result<(), IdempotencyStoreError>;

    /// Fetch the record for `key`, including expired ones.
    async fn find(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError>;

    /// Delete records created more than `max_age` ago, whatever their status.
    ///
    /// Returns the number of records deleted.
    async fn delete_expired(&self, max_age: Duration) -> Result<u64, IdempotencyStoreError>;
}

/// Fixture implementation for tests where deduplication is not under test.
///
/// Every key is new and nothing is retained.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureIdempotencyStore;

#[async_trait]
impl IdempotencyStore for FixtureIdempotencyStore {
    async fn try_start(
        &self,
        _key: &IdempotencyKey,
        _payload_hash: &PayloadHash,
    ) -> Result<StartOutcome, IdempotencyStoreError> {
        Ok(StartOutcome::Started(ClaimId::generate()))
    }

    async fn finish(
        &self,
        _tx: &mut Transaction,
        _key: &IdempotencyKey,
        _claim: ClaimId,
        _result: &Value,
    ) -> Result<(), IdempotencyStoreError> {
        Ok(())
    }

    async fn release(
        &self,
        _key: &IdempotencyKey,
        _claim: ClaimId,
    ) -> Result<(), IdempotencyStoreError> {
        Ok(())
    }

    async fn find(
        &self,
        _key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError> {
        Ok(None)
    }

    async fn delete_expired(&self, _max_age: Duration) -> Result<u64, IdempotencyStoreError> {
        Ok(0)
    }
}
