//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (storage, tracing, queues, probes). Each trait exposes strongly typed
//! errors so adapters map their failures into predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod catalogue_repository;
mod event_publisher;
mod health_check;
mod idempotency_metrics;
mod idempotency_store;
mod job_queue;
mod tracer;
mod transaction_manager;

#[cfg(test)]
pub use catalogue_repository::MockCatalogueRepository;
pub use catalogue_repository::{CatalogueRepository, CatalogueRepositoryError};
#[cfg(test)]
pub use event_publisher::MockEventPublisher;
pub use event_publisher::{EventPublishError, EventPublisher, NoOpEventPublisher};
#[cfg(test)]
pub use health_check::MockHealthCheck;
pub use health_check::{HealthCheck, HealthCheckError, HealthStatus};
#[cfg(test)]
pub use idempotency_metrics::MockIdempotencyMetrics;
pub use idempotency_metrics::{
    IdempotencyMetricLabels, IdempotencyMetrics, IdempotencyMetricsError, NoOpIdempotencyMetrics,
    age_bucket,
};
#[cfg(test)]
pub use idempotency_store::MockIdempotencyStore;
pub use idempotency_store::{FixtureIdempotencyStore, IdempotencyStore, IdempotencyStoreError};
#[cfg(test)]
pub use job_queue::MockJobQueue;
pub use job_queue::{JobQueue, JobQueueError};
pub use tracer::{NoOpTracer, SpanDescriptor, Tracer};
#[cfg(test)]
pub use transaction_manager::MockTransactionManager;
pub use transaction_manager::{
    FixtureTransactionManager, NoOpTransactionBackend, TransactionBackend, TransactionError,
    TransactionManager,
};
