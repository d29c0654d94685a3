//! Port for wrapping a pipeline invocation in a trace span.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::domain::Error;

/// Name and attributes of the span opened around one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpanDescriptor {
    /// Span name, usually the command name.
    pub name: String,
    /// Key/value attributes recorded on the span.
    pub attributes: BTreeMap<String, String>,
}

impl SpanDescriptor {
    /// Start a descriptor with no attributes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an attribute, replacing any previous value for `key`.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Runs an operation inside a span.
///
/// Implementations must start the span before polling `operation` and end it
/// after the operation resolves, whatever the outcome. The operation's result
/// is returned unchanged.
#[async_trait]
pub trait Tracer: Send + Sync {
    /// Run `operation` inside a span described by `span`.
    async fn trace<'a>(
        &self,
        span: SpanDescriptor,
        operation: BoxFuture<'a, Result<Value, Error>>,
    ) -> Result<Value, Error>;
}

/// Tracer that runs the operation without recording anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTracer;

#[async_trait]
impl Tracer for NoOpTracer {
    async fn trace<'a>(
        &self,
        _span: SpanDescriptor,
        operation: BoxFuture<'a, Result<Value, Error>>,
    ) -> Result<Value, Error> {
        operation.await
    }
}
