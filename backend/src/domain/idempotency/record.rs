//! Stored idempotency records and the outcomes of claiming a key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{IdempotencyKey, PayloadHash};

/// Lifecycle status of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// The operation was accepted and has not completed yet.
    Started,
    /// The operation committed and its result is stored.
    Finished,
}

impl IdempotencyStatus {
    /// Stable storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Finished => "finished",
        }
    }
}

/// Ownership token for one successful claim of a key.
///
/// A key can be claimed again once its record expires, so completion and
/// release must prove they still act for the claim that started the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimId(Uuid);

impl ClaimId {
    /// Mint a fresh token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claim_{}", self.0)
    }
}

/// Stored idempotency record keyed by its idempotency key.
///
/// ## Invariants
/// - `result` is `Some` exactly when `status` is [`IdempotencyStatus::Finished`].
/// - `expires_at` is later than `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyRecord {
    /// The deduplication token.
    pub key: IdempotencyKey,
    /// Current lifecycle status.
    pub status: IdempotencyStatus,
    /// Claim that created this record.
    pub claim: ClaimId,
    /// Hash of the canonical command payload that claimed the key.
    pub payload_hash: PayloadHash,
    /// Serialised outcome, present once finished.
    pub result: Option<Value>,
    /// When the key was first claimed.
    pub created_at: DateTime<Utc>,
    /// After this instant the record no longer blocks or replays.
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Build a freshly claimed record under a new [`ClaimId`].
    #[must_use]
    pub fn started(
        key: IdempotencyKey,
        payload_hash: PayloadHash,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            status: IdempotencyStatus::Started,
            claim: ClaimId::generate(),
            payload_hash,
            result: None,
            created_at,
            expires_at,
        }
    }

    /// Return a copy transitioned to finished with the stored result.
    #[must_use]
    pub fn finished(&self, result: Value) -> Self {
        Self {
            status: IdempotencyStatus::Finished,
            result: Some(result),
            ..self.clone()
        }
    }

    /// Whether `claim` still owns this record and it has not finished.
    #[must_use]
    pub fn is_started_by(&self, claim: ClaimId) -> bool {
        self.status == IdempotencyStatus::Started && self.claim == claim
    }

    /// Whether the record has passed its expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Result of atomically claiming an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// No live record existed; the caller now owns the key under this claim.
    Started(ClaimId),
    /// Another invocation holds the key and has not finished.
    InProgress(IdempotencyRecord),
    /// The operation already completed; replay its result.
    Finished(IdempotencyRecord),
}
