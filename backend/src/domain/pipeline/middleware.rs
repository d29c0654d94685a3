//! Middleware contract and the continuation passed to each stage.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;

use super::CommandContext;
use crate::domain::Error;

/// Future returned by a stage or the innermost handler.
pub type StageFuture<'c> = BoxFuture<'c, Result<Value, Error>>;

/// Innermost handler, already bound to its command.
pub type FinalHandler =
    Box<dyn for<'c> FnOnce(&'c mut CommandContext) -> StageFuture<'c> + Send>;

/// Box a closure as a [`FinalHandler`].
///
/// The bound pins the closure's signature so `|ctx| Box::pin(async move { .. })`
/// borrows `ctx` for the lifetime of the returned future.
pub(crate) fn boxed_handler<F>(handler: F) -> FinalHandler
where
    F: for<'c> FnOnce(&'c mut CommandContext) -> StageFuture<'c> + Send + 'static,
{
    Box::new(handler)
}

/// One stage of a [`super::Pipeline`].
///
/// A stage may run work before and after calling `next.run(ctx)`, may
/// short-circuit by returning without calling it, and must return errors from
/// `next` unchanged.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stable stage name used in logs and validation errors.
    fn name(&self) -> &'static str;

    /// Whether this stage opens the invocation's transaction.
    fn opens_transaction(&self) -> bool {
        false
    }

    /// Whether this stage relies on a transaction opened further inside.
    fn requires_transaction(&self) -> bool {
        false
    }

    /// Run this stage.
    async fn process(&self, ctx: &mut CommandContext, next: Next<'_>) -> Result<Value, Error>;
}

/// Remaining stages plus the innermost handler.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    handler: FinalHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [Arc<dyn Middleware>], handler: FinalHandler) -> Self {
        Self { stages, handler }
    }

    /// Invoke the next stage, or the handler when no stages remain.
    pub fn run<'c>(self, ctx: &'c mut CommandContext) -> StageFuture<'c>
    where
        'a: 'c,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.process(
                ctx,
                Next {
                    stages: rest,
                    handler: self.handler,
                },
            ),
            None => (self.handler)(ctx),
        }
    }

    /// Number of stages still to run before the handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}
