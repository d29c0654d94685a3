//! Idempotency primitives for deduplicating command submissions.
//!
//! - [`IdempotencyKey`]: validated deduplication token supplied by the caller,
//!   or a random one when the caller has none.
//! - [`PayloadHash`]: SHA-256 hash of a canonicalized command payload, used to
//!   detect a key reused for a different command.
//! - [`IdempotencyRecord`]: stored key, status, result and expiry.
//! - [`StartOutcome`] / [`ClaimId`]: result of atomically claiming a key and
//!   the token proving ownership of that claim.
//! - [`IdempotencyConfig`]: retention window and sweep cadence.
//!
//! # Payload Canonicalization
//!
//! Semantically equivalent payloads hash identically regardless of key order:
//!
//! 1. JSON objects have their keys sorted recursively.
//! 2. The result is serialized to compact JSON (no whitespace).
//! 3. The SHA-256 hash is computed on the resulting bytes.

mod config;
mod key;
mod payload;
mod record;

pub use config::IdempotencyConfig;
pub use key::{IdempotencyKey, IdempotencyKeyValidationError};
pub use payload::{PayloadHash, PayloadHashError, canonicalize_and_hash, hash_payload};
pub use record::{ClaimId, IdempotencyRecord, IdempotencyStatus, StartOutcome};
