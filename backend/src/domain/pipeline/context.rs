//! Per-invocation state shared by pipeline stages and the handler.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Error, IdempotencyKey, PayloadHash, TraceId, Transaction};

/// Work that must become durable in the same transaction as the handler's
/// writes.
///
/// Participants enlisted during an invocation are prepared by the
/// transaction stage after the handler succeeds and before commit. A failing
/// participant rolls the whole unit of work back.
#[async_trait]
pub trait CommitParticipant: Send + Sync {
    /// Stage the participant's writes into `tx`, given the handler result.
    async fn prepare(&self, tx: &mut Transaction, result: &Value) -> Result<(), Error>;
}

/// Mutable context threaded through one pipeline invocation.
pub struct CommandContext {
    command_name: &'static str,
    idempotency_key: IdempotencyKey,
    payload_hash: PayloadHash,
    trace_id: Option<TraceId>,
    attributes: BTreeMap<String, String>,
    transaction: Option<Transaction>,
    participants: Vec<Box<dyn CommitParticipant>>,
    replayed: bool,
}

impl CommandContext {
    /// Create the context for one invocation.
    #[must_use]
    pub fn new(
        command_name: &'static str,
        idempotency_key: IdempotencyKey,
        payload_hash: PayloadHash,
    ) -> Self {
        Self {
            command_name,
            idempotency_key,
            payload_hash,
            trace_id: None,
            attributes: BTreeMap::new(),
            transaction: None,
            participants: Vec::new(),
            replayed: false,
        }
    }

    /// Name of the command being executed.
    #[must_use]
    pub const fn command_name(&self) -> &'static str {
        self.command_name
    }

    /// Key used for deduplication.
    #[must_use]
    pub const fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    /// Hash of the canonical command payload.
    #[must_use]
    pub const fn payload_hash(&self) -> &PayloadHash {
        &self.payload_hash
    }

    /// Trace identifier, once the tracing stage has assigned one.
    #[must_use]
    pub const fn trace_id(&self) -> Option<TraceId> {
        self.trace_id
    }

    pub(crate) fn set_trace_id(&mut self, trace_id: TraceId) {
        self.trace_id = Some(trace_id);
    }

    /// Span attributes collected so far.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Record a span attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Whether a transaction is open for this invocation.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Borrow the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an internal error when no transaction stage ran before the
    /// handler.
    pub fn transaction_mut(&mut self) -> Result<&mut Transaction, Error> {
        self.transaction.as_mut().ok_or_else(|| {
            Error::internal(format!(
                "command {} requires an open transaction",
                self.command_name
            ))
        })
    }

    pub(crate) fn attach_transaction(&mut self, tx: Transaction) -> Result<(), Error> {
        if self.transaction.is_some() {
            return Err(Error::internal(format!(
                "command {} attempted to open a nested transaction",
                self.command_name
            )));
        }
        self.transaction = Some(tx);
        Ok(())
    }

    pub(crate) fn detach_transaction(&mut self) -> Option<Transaction> {
        self.transaction.take()
    }

    /// Enlist work to be prepared inside the transaction before commit.
    pub fn enlist(&mut self, participant: Box<dyn CommitParticipant>) {
        self.participants.push(participant);
    }

    pub(crate) fn take_participants(&mut self) -> Vec<Box<dyn CommitParticipant>> {
        std::mem::take(&mut self.participants)
    }

    /// Whether the result was replayed from a finished idempotency record.
    #[must_use]
    pub const fn is_replayed(&self) -> bool {
        self.replayed
    }

    pub(crate) fn mark_replayed(&mut self) {
        self.replayed = true;
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("command_name", &self.command_name)
            .field("idempotency_key", &self.idempotency_key)
            .field("trace_id", &self.trace_id)
            .field("in_transaction", &self.transaction.is_some())
            .field("participants", &self.participants.len())
            .field("replayed", &self.replayed)
            .finish_non_exhaustive()
    }
}
