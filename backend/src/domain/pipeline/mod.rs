//! Command execution pipeline.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`] stages wrapped around a
//! [`CommandHandler`]. Stage 1 runs first and returns last:
//!
//! ```text
//! Tracing ─▶ Idempotency ─▶ Transaction ─▶ handler
//!    ◀────────────◀──────────────◀── result / error
//! ```
//!
//! - Tracing is outermost so its span covers deduplication and the whole unit
//!   of work.
//! - Idempotency runs before a transaction is opened: a duplicate is answered
//!   without touching the backing store's transaction machinery, while the
//!   completion record is enlisted into the transaction opened inside it.
//! - Transaction is innermost so its unit of work brackets exactly the handler.
//!
//! Stages are stateless and shared across concurrent invocations; every
//! invocation gets its own [`CommandContext`] and [`crate::domain::Transaction`].

use std::sync::Arc;

use mockable::Clock;
use serde_json::Value;

use super::ports::{IdempotencyMetrics, IdempotencyStore, Tracer, TransactionManager};
use super::{Command, CommandHandler, Error, IdempotencyKey, PayloadHash, hash_payload};

mod context;
mod dispatcher;
mod idempotency;
mod middleware;
mod trace;
mod transaction;

pub use context::{CommandContext, CommitParticipant};
pub use dispatcher::CommandDispatcher;
pub use idempotency::IdempotencyMiddleware;
pub use middleware::{FinalHandler, Middleware, Next, StageFuture};
pub use trace::TracingMiddleware;
pub use transaction::TransactionMiddleware;

use middleware::boxed_handler;

/// Adapters the standard pipelines are assembled from.
#[derive(Clone)]
pub struct PipelinePorts {
    /// Span recorder for the tracing stage.
    pub tracer: Arc<dyn Tracer>,
    /// Key store for the idempotency stage.
    pub idempotency_store: Arc<dyn IdempotencyStore>,
    /// Outcome recorder for the idempotency stage.
    pub idempotency_metrics: Arc<dyn IdempotencyMetrics>,
    /// Unit-of-work factory for the transaction stage.
    pub transactions: Arc<dyn TransactionManager>,
    /// Wall clock used to age idempotency records.
    pub clock: Arc<dyn Clock>,
}

/// Ordered middleware chain.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use bookshelf::domain::ports::FixtureTransactionManager;
/// use bookshelf::domain::{Pipeline, TransactionMiddleware};
///
/// let pipeline = Pipeline::new()
///     .pipe(TransactionMiddleware::new(Arc::new(FixtureTransactionManager)));
/// assert_eq!(pipeline.stage_names(), ["transaction"]);
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// An empty pipeline; commands go straight to their handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracing → Idempotency → Transaction.
    #[must_use]
    pub fn standard(ports: &PipelinePorts) -> Self {
        Self::new()
            .pipe(TracingMiddleware::new(Arc::clone(&ports.tracer)))
            .pipe(IdempotencyMiddleware::new(
                Arc::clone(&ports.idempotency_store),
                Arc::clone(&ports.idempotency_metrics),
                Arc::clone(&ports.clock),
            ))
            .pipe(TransactionMiddleware::new(Arc::clone(&ports.transactions)))
    }

    /// Tracing → Transaction, for commands that must not be deduplicated.
    #[must_use]
    pub fn without_idempotency(ports: &PipelinePorts) -> Self {
        Self::new()
            .pipe(TracingMiddleware::new(Arc::clone(&ports.tracer)))
            .pipe(TransactionMiddleware::new(Arc::clone(&ports.transactions)))
    }

    /// Append a stage.
    #[must_use]
    pub fn pipe(self, middleware: impl Middleware + 'static) -> Self {
        self.pipe_arc(Arc::new(middleware))
    }

    /// Append a shared stage.
    #[must_use]
    pub fn pipe_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run `command` through every stage under a fresh random key.
    ///
    /// Nothing ties this submission to an earlier one, so the command always
    /// executes. Retries that must not execute twice go through
    /// [`Pipeline::process_with_key`].
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a stage or the handler, unchanged.
    pub async fn process<C, H>(&self, command: C, handler: Arc<H>) -> Result<C::Output, Error>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        self.process_with_key(command, IdempotencyKey::random(), handler)
            .await
    }

    /// Run `command` through every stage under a caller-supplied key.
    ///
    /// Submissions sharing a key execute at most once while the key is
    /// retained; later ones replay the stored result.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a stage or the handler, unchanged.
    pub async fn process_with_key<C, H>(
        &self,
        command: C,
        key: IdempotencyKey,
        handler: Arc<H>,
    ) -> Result<C::Output, Error>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let payload_hash = payload_hash_of(&command)?;
        self.execute(command, key, payload_hash, handler).await
    }

    async fn execute<C, H>(
        &self,
        command: C,
        key: IdempotencyKey,
        payload_hash: PayloadHash,
        handler: Arc<H>,
    ) -> Result<C::Output, Error>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        self.validate()?;

        let mut ctx = CommandContext::new(C::NAME, key, payload_hash);
        let final_handler = boxed_handler(move |ctx| {
            Box::pin(async move {
                let output = handler.handle(command, ctx).await?;
                serde_json::to_value(output).map_err(|err| {
                    Error::internal(format!("failed to serialise {} result: {err}", C::NAME))
                })
            })
        });

        let value = Next::new(&self.stages, final_handler).run(&mut ctx).await?;
        decode_output::<C>(value)
    }

    fn validate(&self) -> Result<(), Error> {
        for (index, stage) in self.stages.iter().enumerate() {
            if !stage.requires_transaction() {
                continue;
            }
            let opened_inside = self
                .stages
                .get(index + 1..)
                .is_some_and(|inner| inner.iter().any(|s| s.opens_transaction()));
            if !opened_inside {
                return Err(Error::internal(format!(
                    "middleware {} needs a transaction stage after it",
                    stage.name()
                )));
            }
        }
        Ok(())
    }
}

fn payload_hash_of<C: Command>(command: &C) -> Result<PayloadHash, Error> {
    hash_payload(command).map_err(|err| Error::invalid_request(err.to_string()))
}

fn decode_output<C: Command>(value: Value) -> Result<C::Output, Error> {
    serde_json::from_value(value).map_err(|err| {
        Error::internal(format!("failed to decode {} result: {err}", C::NAME))
    })
}
