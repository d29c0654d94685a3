//! Domain primitives, the command pipeline and the catalogue use-cases.
//!
//! Purpose: keep business rules and execution semantics independent of any
//! storage, transport or telemetry backend. Driven adapters plug in through
//! [`ports`].
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure value.
//! - Pipeline / CommandDispatcher: Tracing → Idempotency → Transaction chain.
//! - Transaction: unit of work with staged writes and after-commit actions.
//! - TransactionalEventPublisher: domain events published after commit.
//! - HealthCheckRunner: aggregated health report.
//! - catalogue: authors, books and subscriptions.

pub mod catalogue;
pub mod error;
pub mod idempotency;
pub mod pipeline;
pub mod ports;

mod command;
mod event_publisher;
mod events;
mod health;
mod retention;
mod trace_id;
mod transaction;

pub use self::catalogue::{Author, AuthorId, Book, BookId, BookStatus, Subscription};
pub use self::command::{Command, CommandHandler};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::event_publisher::TransactionalEventPublisher;
pub use self::events::{DomainEvent, Job};
pub use self::health::{
    HealthCheckResult, HealthCheckRunner, HealthReport, HealthState, IdempotencyStoreCheck,
    QueueDepthCheck,
};
pub use self::idempotency::{
    ClaimId, IdempotencyConfig, IdempotencyKey, IdempotencyKeyValidationError,
    IdempotencyRecord, IdempotencyStatus, PayloadHash, PayloadHashError, StartOutcome,
    canonicalize_and_hash, hash_payload,
};
pub use self::pipeline::{
    CommandContext, CommandDispatcher, CommitParticipant, IdempotencyMiddleware, Middleware, Next,
    Pipeline, PipelinePorts, TracingMiddleware, TransactionMiddleware,
};
pub use self::retention::IdempotencySweeper;
pub use self::trace_id::TraceId;
pub use self::transaction::{DeferredAction, PostCommit, StagedWrite, Transaction, TransactionId};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use bookshelf::domain::{DomainResult, Error};
///
/// fn archived() -> DomainResult<()> {
///     Err(Error::conflict("book is archived"))
/// }
/// assert!(archived().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
