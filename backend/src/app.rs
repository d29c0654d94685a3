//! Composition root wiring the catalogue onto in-memory adapters.
//!
//! Binaries and end-to-end tests build one [`Bookshelf`] and drive it through
//! [`Bookshelf::dispatch`]; every command then runs the standard pipeline.

use std::sync::Arc;

use mockable::Clock;

use crate::config::AppSettings;
use crate::domain::catalogue::{CatalogueService, SubscriberNotifier};
use crate::domain::ports::HealthCheckError;
use crate::domain::{
    Command, CommandDispatcher, CommandHandler, Error, HealthCheckRunner, HealthState,
    IdempotencyKey, IdempotencyStoreCheck, IdempotencySweeper, PipelinePorts, QueueDepthCheck,
    TransactionalEventPublisher,
};
use crate::outbound::memory::{
    InMemoryCatalogueRepository, InMemoryIdempotencyStore, InMemoryTransactionManager,
};
use crate::outbound::queue::InMemoryJobQueue;
use crate::outbound::telemetry::{LoggingEventPublisher, TracingIdempotencyMetrics, TracingTracer};

/// Fully wired catalogue backend.
pub struct Bookshelf {
    dispatcher: CommandDispatcher,
    catalogue: Arc<CatalogueService>,
    health: HealthCheckRunner,
    health_state: Arc<HealthState>,
    sweeper: IdempotencySweeper,
    repository: InMemoryCatalogueRepository,
    queue: InMemoryJobQueue,
    idempotency_store: InMemoryIdempotencyStore,
    transactions: InMemoryTransactionManager,
    metrics: Arc<TracingIdempotencyMetrics>,
}

impl Bookshelf {
    /// Wire every port to its in-memory adapter.
    ///
    /// # Errors
    ///
    /// Returns [`HealthCheckError`] when a health check cannot be built.
    pub fn in_memory(
        settings: &AppSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, HealthCheckError> {
        let idempotency = settings.idempotency_config();
        let repository = InMemoryCatalogueRepository::new();
        let queue = InMemoryJobQueue::new();
        let idempotency_store = InMemoryIdempotencyStore::new(clock.clone(), &idempotency);
        let transactions = InMemoryTransactionManager::new();
        let metrics = Arc::new(TracingIdempotencyMetrics::new());

        let ports = PipelinePorts {
            tracer: Arc::new(TracingTracer::new()),
            idempotency_store: Arc::new(idempotency_store.clone()),
            idempotency_metrics: metrics.clone(),
            transactions: Arc::new(transactions.clone()),
            clock: clock.clone(),
        };

        let notifier = SubscriberNotifier::new(
            Arc::new(repository.clone()),
            Arc::new(queue.clone()),
            clock.clone(),
        );
        let events =
            TransactionalEventPublisher::new(Arc::new(LoggingEventPublisher::new(notifier)));
        let catalogue = Arc::new(CatalogueService::new(
            Arc::new(repository.clone()),
            events,
            clock.clone(),
        ));

        let health_state = Arc::new(HealthState::new());
        let health = HealthCheckRunner::new(clock)
            .with_check(health_state.clone())
            .with_check(Arc::new(IdempotencyStoreCheck::new(
                ports.idempotency_store.clone(),
            )?))
            .with_check(Arc::new(QueueDepthCheck::new(
                Arc::new(queue.clone()),
                settings.queue_depth_threshold,
            )));
        let sweeper = IdempotencySweeper::new(ports.idempotency_store.clone(), idempotency);

        Ok(Self {
            dispatcher: CommandDispatcher::new(&ports),
            catalogue,
            health,
            health_state,
            sweeper,
            repository,
            queue,
            idempotency_store,
            transactions,
            metrics,
        })
    }

    /// Run `command` once through the pipeline, without deduplication.
    ///
    /// # Errors
    ///
    /// Returns the pipeline or handler error unchanged.
    pub async fn dispatch<C>(&self, command: C) -> Result<C::Output, Error>
    where
        C: Command,
        CatalogueService: CommandHandler<C>,
    {
        self.dispatcher
            .dispatch(command, Arc::clone(&self.catalogue))
            .await
    }

    /// Run `command` under a caller-supplied idempotency key.
    ///
    /// # Errors
    ///
    /// Returns the pipeline or handler error unchanged.
    pub async fn dispatch_with_key<C>(
        &self,
        command: C,
        key: IdempotencyKey,
    ) -> Result<C::Output, Error>
    where
        C: Command,
        CatalogueService: CommandHandler<C>,
    {
        self.dispatcher
            .dispatch_with_key(command, key, Arc::clone(&self.catalogue))
            .await
    }

    /// Aggregated health checks.
    pub fn health(&self) -> &HealthCheckRunner {
        &self.health
    }

    /// Process readiness and liveness flags.
    pub fn health_state(&self) -> &Arc<HealthState> {
        &self.health_state
    }

    /// Retention sweeper for the idempotency store.
    pub fn sweeper(&self) -> IdempotencySweeper {
        self.sweeper.clone()
    }

    /// Catalogue storage.
    pub fn repository(&self) -> &InMemoryCatalogueRepository {
        &self.repository
    }

    /// Notification job queue.
    pub fn queue(&self) -> &InMemoryJobQueue {
        &self.queue
    }

    /// Idempotency record storage.
    pub fn idempotency_store(&self) -> &InMemoryIdempotencyStore {
        &self.idempotency_store
    }

    /// Transaction manager, for commit and rollback counts.
    pub fn transactions(&self) -> &InMemoryTransactionManager {
        &self.transactions
    }

    /// Idempotency outcome recorder.
    pub fn metrics(&self) -> &TracingIdempotencyMetrics {
        &self.metrics
    }
}
