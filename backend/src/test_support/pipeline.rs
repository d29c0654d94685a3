//! Recording doubles for pipeline ports.
//!
//! The doubles can share a [`Journal`] so tests can assert the relative order
//! of spans, transaction boundaries, handler runs and event publication.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::domain::ports::{
    EventPublishError, EventPublisher, SpanDescriptor, Tracer, TransactionBackend,
    TransactionError, TransactionManager,
};
use crate::domain::{DomainEvent, Error};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test double mutex poisoned"),
    }
}

/// One journal line: a label and when it was written.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// What happened, for example `"tx:commit"`.
    pub label: String,
    /// When it happened.
    pub at: Instant,
}

/// Shared, ordered log of test double activity.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<JournalEntry>>>);

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `label`.
    pub fn record(&self, label: impl Into<String>) {
        lock(&self.0).push(JournalEntry {
            label: label.into(),
            at: Instant::now(),
        });
    }

    /// Labels in recording order.
    pub fn labels(&self) -> Vec<String> {
        lock(&self.0).iter().map(|entry| entry.label.clone()).collect()
    }

    /// Instant of the first entry labelled `label`.
    pub fn instant_of(&self, label: &str) -> Option<Instant> {
        lock(&self.0)
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.at)
    }

    /// Position of the first entry labelled `label`.
    pub fn position_of(&self, label: &str) -> Option<usize> {
        lock(&self.0).iter().position(|entry| entry.label == label)
    }
}

/// Span captured by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub struct RecordedSpan {
    /// Span name.
    pub name: String,
    /// Span attributes.
    pub attributes: BTreeMap<String, String>,
    /// When the span opened.
    pub started_at: Instant,
    /// When the span closed.
    pub finished_at: Instant,
    /// Whether the traced operation succeeded.
    pub succeeded: bool,
}

/// Tracer that keeps every finished span in memory.
///
/// Writes `span:start:<name>` and `span:end:<name>` to its journal.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    spans: Mutex<Vec<RecordedSpan>>,
    journal: Journal,
}

impl RecordingTracer {
    /// Record into `journal` as well as the span list.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            spans: Mutex::default(),
            journal,
        }
    }

    /// Spans finished so far.
    pub fn spans(&self) -> Vec<RecordedSpan> {
        lock(&self.spans).clone()
    }
}

#[async_trait]
impl Tracer for RecordingTracer {
    async fn trace<'a>(
        &self,
        span: SpanDescriptor,
        operation: BoxFuture<'a, Result<Value, Error>>,
    ) -> Result<Value, Error> {
        let started_at = Instant::now();
        self.journal.record(format!("span:start:{}", span.name));
        let result = operation.await;
        self.journal.record(format!("span:end:{}", span.name));
        lock(&self.spans).push(RecordedSpan {
            name: span.name,
            attributes: span.attributes,
            started_at,
            finished_at: Instant::now(),
            succeeded: result.is_ok(),
        });
        result
    }
}

/// Transaction manager that journals `tx:begin`, `tx:commit` and
/// `tx:rollback`, and can be told to fail commits.
#[derive(Debug, Default)]
pub struct ScriptedTransactionManager {
    journal: Journal,
    fail_commits: Arc<AtomicBool>,
}

impl ScriptedTransactionManager {
    /// Record into `journal`.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            fail_commits: Arc::default(),
        }
    }

    /// Make every later commit fail.
    pub fn fail_commits(&self) {
        self.fail_commits.store(true, Ordering::SeqCst);
    }

    /// The shared journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Number of transactions begun.
    pub fn begun(&self) -> usize {
        self.count("tx:begin")
    }

    /// Number of successful commits.
    pub fn commits(&self) -> usize {
        self.count("tx:commit")
    }

    /// Number of rollbacks.
    pub fn rollbacks(&self) -> usize {
        self.count("tx:rollback")
    }

    fn count(&self, label: &str) -> usize {
        self.journal
            .labels()
            .iter()
            .filter(|entry| entry.as_str() == label)
            .count()
    }
}

#[async_trait]
impl TransactionManager for ScriptedTransactionManager {
    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, TransactionError> {
        self.journal.record("tx:begin");
        Ok(Box::new(ScriptedBackend {
            journal: self.journal.clone(),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

struct ScriptedBackend {
    journal: Journal,
    fail_commit: bool,
}

#[async_trait]
impl TransactionBackend for ScriptedBackend {
    async fn commit(self: Box<Self>) -> Result<(), TransactionError> {
        if self.fail_commit {
            self.journal.record("tx:commit-failed");
            return Err(TransactionError::commit("scripted commit failure"));
        }
        self.journal.record("tx:commit");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), TransactionError> {
        self.journal.record("tx:rollback");
        Ok(())
    }
}

/// Event publisher that keeps published events and journals
/// `publish:<event_type>`.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<DomainEvent>>,
    journal: Journal,
    fail: AtomicBool,
}

impl RecordingEventPublisher {
    /// Record into `journal`.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            events: Mutex::default(),
            journal,
            fail: AtomicBool::new(false),
        }
    }

    /// Make every later publication fail after being journalled.
    pub fn fail_publications(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Events published successfully.
    pub fn events(&self) -> Vec<DomainEvent> {
        lock(&self.events).clone()
    }

    /// Event types published successfully, in order.
    pub fn event_types(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .map(|event| event.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish_event(&self, event: &DomainEvent) -> Result<(), EventPublishError> {
        self.journal.record(format!("publish:{}", event.event_type));
        if self.fail.load(Ordering::SeqCst) {
            return Err(EventPublishError::unavailable("scripted publish failure"));
        }
        lock(&self.events).push(event.clone());
        Ok(())
    }
}
