//! Behavioural tests for the standard command pipeline.
//!
//! Every test wires the real middleware chain to the in-memory idempotency
//! store and the recording doubles from `bookshelf::test_support`, then
//! checks an observable guarantee: single execution per key, atomic
//! rollback, post-commit publication, span nesting, replay and retention.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bookshelf::domain::ports::{IdempotencyStore, NoOpIdempotencyMetrics};
use bookshelf::domain::{
    Command, CommandContext, CommandHandler, DomainEvent, Error, ErrorCode, IdempotencyConfig,
    IdempotencyKey, IdempotencyStatus, IdempotencySweeper, Pipeline, PipelinePorts,
    TransactionalEventPublisher, hash_payload,
};
use bookshelf::outbound::memory::InMemoryIdempotencyStore;
use bookshelf::test_support::clock::MutableClock;
use bookshelf::test_support::pipeline::{
    Journal, RecordingEventPublisher, RecordingTracer, ScriptedTransactionManager,
};
use mockable::Clock;
use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Notify;

#[derive(Debug, Clone, Serialize)]
struct ShelveBook {
    title: String,
}

impl ShelveBook {
    fn titled(title: &str) -> Self {
        Self {
            title: title.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Shelved {
    title: String,
    invocation: usize,
}

impl Command for ShelveBook {
    type Output = Shelved;
    const NAME: &'static str = "shelve_book";
}

#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

/// Handler that shelves a title transactionally and announces it.
struct Librarian {
    journal: Journal,
    shelf: Arc<Mutex<Vec<String>>>,
    events: TransactionalEventPublisher,
    clock: Arc<MutableClock>,
    invocations: AtomicUsize,
    fail: bool,
    gate: Option<Arc<Gate>>,
}

#[async_trait]
impl CommandHandler<ShelveBook> for Librarian {
    async fn handle(
        &self,
        command: ShelveBook,
        ctx: &mut CommandContext,
    ) -> Result<Shelved, Error> {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.record("handler:start");
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let tx = ctx.transaction_mut()?;
        let shelf = Arc::clone(&self.shelf);
        let title = command.title.clone();
        tx.stage(move || shelf.lock().expect("shelf").push(title));
        let event =
            DomainEvent::new("book_shelved", self.clock.utc()).with("title", json!(command.title));
        self.events.publish_after_commit(tx, event);
        self.journal.record("handler:end");

        if self.fail {
            return Err(Error::conflict("the shelf is full"));
        }
        Ok(Shelved {
            title: command.title,
            invocation,
        })
    }
}

struct World {
    journal: Journal,
    tracer: Arc<RecordingTracer>,
    transactions: Arc<ScriptedTransactionManager>,
    publisher: Arc<RecordingEventPublisher>,
    store: InMemoryIdempotencyStore,
    clock: Arc<MutableClock>,
    shelf: Arc<Mutex<Vec<String>>>,
    pipeline: Arc<Pipeline>,
}

impl World {
    fn librarian(&self, fail: bool, gate: Option<Arc<Gate>>) -> Arc<Librarian> {
        Arc::new(Librarian {
            journal: self.journal.clone(),
            shelf: Arc::clone(&self.shelf),
            events: TransactionalEventPublisher::new(self.publisher.clone()),
            clock: Arc::clone(&self.clock),
            invocations: AtomicUsize::new(0),
            fail,
            gate,
        })
    }

    fn shelved(&self) -> Vec<String> {
        self.shelf.lock().expect("shelf").clone()
    }
}

#[fixture]
fn world() -> World {
    let journal = Journal::new();
    let clock = Arc::new(MutableClock::fixed());
    let tracer = Arc::new(RecordingTracer::with_journal(journal.clone()));
    let transactions = Arc::new(ScriptedTransactionManager::with_journal(journal.clone()));
    let publisher = Arc::new(RecordingEventPublisher::with_journal(journal.clone()));
    let store = InMemoryIdempotencyStore::new(clock.clone(), &IdempotencyConfig::default());
    let pipeline = Pipeline::standard(&PipelinePorts {
        tracer: tracer.clone(),
        idempotency_store: Arc::new(store.clone()),
        idempotency_metrics: Arc::new(NoOpIdempotencyMetrics),
        transactions: transactions.clone(),
        clock: clock.clone(),
    });
    World {
        journal,
        tracer,
        transactions,
        publisher,
        store,
        clock,
        shelf: Arc::default(),
        pipeline: Arc::new(pipeline),
    }
}

fn key(raw: &str) -> IdempotencyKey {
    IdempotencyKey::new(raw).expect("valid key")
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_execute_once(world: World) {
    let gate = Arc::new(Gate::default());
    let librarian = world.librarian(false, Some(gate.clone()));

    let first = {
        let pipeline = Arc::clone(&world.pipeline);
        let librarian = Arc::clone(&librarian);
        tokio::spawn(async move {
            pipeline
                .process_with_key(ShelveBook::titled("Kindred"), key("race"), librarian)
                .await
        })
    };
    gate.entered.notified().await;

    let duplicates: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = Arc::clone(&world.pipeline);
            let librarian = Arc::clone(&librarian);
            tokio::spawn(async move {
                pipeline
                    .process_with_key(ShelveBook::titled("Kindred"), key("race"), librarian)
                    .await
            })
        })
        .collect();
    for duplicate in duplicates {
        let err = duplicate.await.expect("join").expect_err("duplicate");
        assert_eq!(err.code(), ErrorCode::DuplicateInProgress);
        assert!(err.is_retryable());
    }

    gate.release.notify_one();
    let shelved = first.await.expect("join").expect("first run");

    assert_eq!(shelved.invocation, 1);
    assert_eq!(librarian.invocations.load(Ordering::SeqCst), 1);
    assert_eq!(world.shelved(), ["Kindred"]);
}

#[rstest]
#[tokio::test]
async fn failing_handler_leaves_no_trace(world: World) {
    let librarian = world.librarian(true, None);

    let err = world
        .pipeline
        .process_with_key(ShelveBook::titled("Dawn"), key("fail"), librarian)
        .await
        .expect_err("handler fails");

    assert_eq!(err.code(), ErrorCode::Conflict);
    assert!(world.shelved().is_empty());
    assert!(world.publisher.events().is_empty());
    assert_eq!(world.transactions.rollbacks(), 1);
    assert_eq!(world.transactions.commits(), 0);
    assert_eq!(
        world.store.find(&key("fail")).await.expect("find"),
        None,
        "failed runs release their key"
    );
}

#[rstest]
#[tokio::test]
async fn events_are_published_only_after_commit(world: World) {
    let librarian = world.librarian(false, None);

    world
        .pipeline
        .process(ShelveBook::titled("Parable of the Sower"), librarian)
        .await
        .expect("shelved");

    let commit = world.journal.position_of("tx:commit").expect("committed");
    let publish = world
        .journal
        .position_of("publish:book_shelved")
        .expect("published");
    assert!(commit < publish, "journal: {:?}", world.journal.labels());
    assert_eq!(world.publisher.event_types(), ["book_shelved"]);
}

#[rstest]
#[tokio::test]
async fn commit_failure_discards_writes_and_events(world: World) {
    world.transactions.fail_commits();
    let librarian = world.librarian(false, None);

    let err = world
        .pipeline
        .process(ShelveBook::titled("Wild Seed"), librarian)
        .await
        .expect_err("commit fails");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    assert!(world.shelved().is_empty());
    assert!(world.publisher.events().is_empty());
}

#[rstest]
#[tokio::test]
async fn span_encloses_transaction_which_encloses_handler(world: World) {
    let librarian = world.librarian(false, None);

    world
        .pipeline
        .process(ShelveBook::titled("Fledgling"), librarian)
        .await
        .expect("shelved");

    let at = |label: &str| {
        world
            .journal
            .instant_of(label)
            .unwrap_or_else(|| panic!("missing journal entry {label}"))
    };
    let span = (at("span:start:shelve_book"), at("span:end:shelve_book"));
    let tx = (at("tx:begin"), at("tx:commit"));
    let handler = (at("handler:start"), at("handler:end"));

    assert!(span.0 <= tx.0 && tx.1 <= span.1);
    assert!(tx.0 <= handler.0 && handler.1 <= tx.1);
    assert!(span.1 - span.0 >= tx.1 - tx.0);
    assert!(tx.1 - tx.0 >= handler.1 - handler.0);

    let spans = world.tracer.spans();
    let recorded = spans.first().expect("span");
    assert_eq!(recorded.name, "shelve_book");
    assert!(recorded.succeeded);
    assert!(recorded.attributes.contains_key("trace_id"));
}

#[rstest]
#[tokio::test]
async fn replay_returns_stored_result_without_rerunning(world: World) {
    let librarian = world.librarian(false, None);

    let first = world
        .pipeline
        .process_with_key(
            ShelveBook::titled("Lilith's Brood"),
            key("brood"),
            Arc::clone(&librarian),
        )
        .await
        .expect("first run");
    world.clock.advance(Duration::from_secs(90));
    let second = world
        .pipeline
        .process_with_key(
            ShelveBook::titled("Lilith's Brood"),
            key("brood"),
            Arc::clone(&librarian),
        )
        .await
        .expect("replay");

    assert_eq!(first, second);
    assert_eq!(librarian.invocations.load(Ordering::SeqCst), 1);
    assert_eq!(world.shelved(), ["Lilith's Brood"]);
    assert_eq!(world.publisher.events().len(), 1);
    assert_eq!(world.transactions.begun(), 1);
}

#[rstest]
#[tokio::test]
async fn keyless_commands_with_repeated_payloads_each_run(world: World) {
    let librarian = world.librarian(false, None);

    for title in ["Dawn", "Adulthood Rites", "Dawn"] {
        world
            .pipeline
            .process(ShelveBook::titled(title), Arc::clone(&librarian))
            .await
            .expect("shelved");
    }

    assert_eq!(librarian.invocations.load(Ordering::SeqCst), 3);
    assert_eq!(world.shelved(), ["Dawn", "Adulthood Rites", "Dawn"]);
    assert_eq!(world.publisher.events().len(), 3);
}

#[rstest]
#[tokio::test]
async fn reused_key_with_new_payload_conflicts(world: World) {
    let librarian = world.librarian(false, None);
    world
        .pipeline
        .process_with_key(ShelveBook::titled("Dawn"), key("shared"), Arc::clone(&librarian))
        .await
        .expect("first run");

    let err = world
        .pipeline
        .process_with_key(ShelveBook::titled("Imago"), key("shared"), librarian)
        .await
        .expect_err("different payload");

    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(err.field(), Some("idempotencyKey"));
}

#[rstest]
#[tokio::test]
async fn retention_sweep_removes_only_old_records(world: World) {
    let librarian = world.librarian(false, None);
    world
        .pipeline
        .process_with_key(ShelveBook::titled("Old"), key("old"), Arc::clone(&librarian))
        .await
        .expect("old run");
    let abandoned = hash_payload(&json!({"title": "Stuck"})).expect("hash");
    world
        .store
        .try_start(&key("stuck"), &abandoned)
        .await
        .expect("abandoned start");

    world.clock.advance_hours(49);
    world
        .pipeline
        .process_with_key(ShelveBook::titled("New"), key("new"), librarian)
        .await
        .expect("new run");

    let deleted = world
        .store
        .delete_expired(Duration::from_secs(172_800))
        .await
        .expect("sweep");
    assert_eq!(deleted, 2);
    assert_eq!(world.store.find(&key("old")).await.expect("find"), None);
    assert!(world.store.find(&key("new")).await.expect("find").is_some());

    let sweeper =
        IdempotencySweeper::new(Arc::new(world.store.clone()), IdempotencyConfig::default());
    assert_eq!(sweeper.sweep_once().await.expect("second sweep"), 0);
}

#[rstest]
#[tokio::test]
async fn same_key_twice_runs_once_and_blocks_the_overlap(world: World) {
    let gate = Arc::new(Gate::default());
    let librarian = world.librarian(false, Some(gate.clone()));

    let first = {
        let pipeline = Arc::clone(&world.pipeline);
        let librarian = Arc::clone(&librarian);
        tokio::spawn(async move {
            pipeline
                .process_with_key(ShelveBook::titled("Clay's Ark"), key("abc"), librarian)
                .await
        })
    };
    gate.entered.notified().await;

    let overlap = world
        .pipeline
        .process_with_key(ShelveBook::titled("Clay's Ark"), key("abc"), Arc::clone(&librarian))
        .await
        .expect_err("overlapping run");
    assert_eq!(overlap.code(), ErrorCode::DuplicateInProgress);

    gate.release.notify_one();
    first.await.expect("join").expect("first run");

    let record = world
        .store
        .find(&key("abc"))
        .await
        .expect("find")
        .expect("record kept");
    assert_eq!(record.status, IdempotencyStatus::Finished);
    assert_eq!(
        record.result,
        Some(json!({"title": "Clay's Ark", "invocation": 1}))
    );
}
