//! `tracing`-backed telemetry adapters.
//!
//! - [`TracingTracer`] opens an `info` span per invocation and logs its
//!   outcome with the elapsed time.
//! - [`TracingIdempotencyMetrics`] emits one structured event per
//!   idempotency outcome and keeps running totals.
//! - [`LoggingEventPublisher`] wraps another publisher and logs each
//!   delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::ports::{
    EventPublishError, EventPublisher, IdempotencyMetricLabels, IdempotencyMetrics,
    IdempotencyMetricsError, SpanDescriptor, Tracer,
};
use crate::domain::{DomainEvent, Error};

/// [`Tracer`] that maps each invocation onto a `tracing` span.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracer;

impl TracingTracer {
    /// Create a tracer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn attribute<'a>(span: &'a SpanDescriptor, key: &str) -> &'a str {
    span.attributes.get(key).map_or("", String::as_str)
}

#[async_trait]
impl Tracer for TracingTracer {
    async fn trace<'a>(
        &self,
        span: SpanDescriptor,
        operation: BoxFuture<'a, Result<Value, Error>>,
    ) -> Result<Value, Error> {
        let tracing_span = info_span!(
            "command",
            name = %span.name,
            trace_id = attribute(&span, "trace_id"),
            idempotency_key = attribute(&span, "idempotency_key"),
        );

        let started = Instant::now();
        let result = operation.instrument(tracing_span.clone()).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing_span.in_scope(|| match &result {
            Ok(_) => info!(elapsed_ms, "command completed"),
            Err(err) => warn!(
                elapsed_ms,
                code = ?err.code(),
                message = err.message(),
                "command failed"
            ),
        });
        result
    }
}

/// Running totals kept by [`TracingIdempotencyMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyTotals {
    /// Keys claimed for the first time.
    pub misses: u64,
    /// Results replayed.
    pub hits: u64,
    /// Keys reused with a different payload.
    pub conflicts: u64,
    /// Duplicates rejected while the original was still running.
    pub in_progress: u64,
}

/// [`IdempotencyMetrics`] that logs each outcome under the
/// `bookshelf::idempotency` target.
#[derive(Debug, Default)]
pub struct TracingIdempotencyMetrics {
    misses: AtomicU64,
    hits: AtomicU64,
    conflicts: AtomicU64,
    in_progress: AtomicU64,
}

impl TracingIdempotencyMetrics {
    /// Create a recorder with zeroed totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals recorded so far.
    pub fn totals(&self) -> IdempotencyTotals {
        IdempotencyTotals {
            misses: self.misses.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            in_progress: self.in_progress.load(Ordering::Relaxed),
        }
    }

    fn record(&self, counter: &AtomicU64, outcome: &str, labels: &IdempotencyMetricLabels) {
        let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            target: "bookshelf::idempotency",
            outcome,
            command = %labels.command,
            age_bucket = labels.age_bucket.as_deref().unwrap_or("n/a"),
            total,
            "idempotency outcome"
        );
    }
}

#[async_trait]
impl IdempotencyMetrics for TracingIdempotencyMetrics {
    async fn record_miss(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        self.record(&self.misses, "miss", labels);
        Ok(())
    }

    async fn record_hit(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        self.record(&self.hits, "hit", labels);
        Ok(())
    }

    async fn record_conflict(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        self.record(&self.conflicts, "conflict", labels);
        Ok(())
    }

    async fn record_in_progress(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        self.record(&self.in_progress, "in_progress", labels);
        Ok(())
    }
}

/// Decorator logging every event handed to the inner publisher.
#[derive(Debug, Clone)]
pub struct LoggingEventPublisher<P> {
    inner: P,
}

impl<P> LoggingEventPublisher<P> {
    /// Wrap `inner`.
    pub const fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P> EventPublisher for LoggingEventPublisher<P>
where
    P: EventPublisher,
{
    async fn publish_event(&self, event: &DomainEvent) -> Result<(), EventPublishError> {
        debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "publishing domain event"
        );
        match self.inner.publish_event(event).await {
            Ok(()) => {
                info!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "domain event published"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    error = %err,
                    "domain event publication failed"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use crate::domain::ports::MockEventPublisher;
    use crate::domain::{Transaction, TransactionalEventPublisher};
    use crate::test_support::clock::MutableClock;
    use crate::test_support::pipeline::ScriptedTransactionManager;
    use chrono::{TimeDelta, Utc};
    use mockable::Clock;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::success(Ok(json!({"id": 7})))]
    #[case::failure(Err(Error::conflict("book is archived")))]
    #[tokio::test]
    async fn tracer_returns_operation_result(#[case] outcome: Result<Value, Error>) {
        let span = SpanDescriptor::new("update_book_title")
            .with_attribute("trace_id", "00000000-0000-0000-0000-000000000001");
        let expected = outcome.clone();

        let actual = TracingTracer::new()
            .trace(span, Box::pin(async move { outcome }))
            .await;

        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn metrics_keep_totals_per_outcome() {
        let metrics = TracingIdempotencyMetrics::new();
        let miss = IdempotencyMetricLabels::miss("create_book");
        let existing = IdempotencyMetricLabels::existing("create_book", TimeDelta::minutes(3));

        metrics.record_miss(&miss).await.expect("miss");
        metrics.record_hit(&existing).await.expect("hit");
        metrics.record_hit(&existing).await.expect("hit");
        metrics.record_in_progress(&existing).await.expect("in progress");

        assert_eq!(
            metrics.totals(),
            IdempotencyTotals {
                misses: 1,
                hits: 2,
                conflicts: 0,
                in_progress: 1,
            }
        );
    }

    #[rstest]
    #[case::delivered(true)]
    #[case::rejected(false)]
    #[tokio::test]
    async fn logging_publisher_forwards_outcome(#[case] delivered: bool) {
        let clock = MutableClock::fixed();
        let event = DomainEvent::new("book_deleted", clock.utc());
        let event_id = event.event_id;
        let mut inner = MockEventPublisher::new();
        inner
            .expect_publish_event()
            .withf(move |event| event.event_id == event_id)
            .times(1)
            .returning(move |_| {
                if delivered {
                    Ok(())
                } else {
                    Err(EventPublishError::rejected("broker said no"))
                }
            });

        let result = LoggingEventPublisher::new(inner).publish_event(&event).await;

        assert_eq!(result.is_ok(), delivered);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn count(&self, message: &str) -> usize {
            let bytes = self.0.lock().expect("log buffer").clone();
            String::from_utf8_lossy(&bytes).matches(message).count()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn committed_event_delivery_is_logged_once() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut inner = MockEventPublisher::new();
        inner.expect_publish_event().times(1).returning(|_| Ok(()));
        let publisher =
            TransactionalEventPublisher::new(Arc::new(LoggingEventPublisher::new(inner)));
        let mut tx = Transaction::begin(&ScriptedTransactionManager::default())
            .await
            .expect("begin");
        publisher.publish_after_commit(&mut tx, DomainEvent::new("book_created", Utc::now()));
        tx.commit().await.expect("commit").run().await;

        assert_eq!(logs.count("domain event published"), 1);
    }
}
