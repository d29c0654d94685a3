//! Outermost stage: one span per invocation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{CommandContext, Middleware, Next};
use crate::domain::ports::{SpanDescriptor, Tracer};
use crate::domain::{Error, TraceId};

/// Opens a span named after the command around the rest of the pipeline.
///
/// The stage reuses a [`TraceId`] already in scope (a command dispatched from
/// inside another traced task) or mints a new one, and keeps it in task-local
/// scope while the inner stages run.
pub struct TracingMiddleware {
    tracer: Arc<dyn Tracer>,
}

impl TracingMiddleware {
    /// Trace through `tracer`.
    #[must_use]
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer }
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn process(&self, ctx: &mut CommandContext, next: Next<'_>) -> Result<Value, Error> {
        let trace_id = TraceId::current_or_generate();
        let key = ctx.idempotency_key().to_string();
        ctx.set_trace_id(trace_id);
        ctx.set_attribute("command", ctx.command_name());
        ctx.set_attribute("idempotency_key", key);
        ctx.set_attribute("trace_id", trace_id.to_string());

        let span = SpanDescriptor {
            name: ctx.command_name().to_owned(),
            attributes: ctx.attributes().clone(),
        };
        let operation = Box::pin(TraceId::scope(trace_id, next.run(ctx)));
        self.tracer.trace(span, operation).await
    }
}
