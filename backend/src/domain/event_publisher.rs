//! Publication of domain events once their transaction has committed.
//!
//! Events are never delivered for work that rolled back, but delivery is not
//! guaranteed either: a publish that fails after commit is logged and
//! dropped. Exactly-once delivery needs an outbox.

use std::sync::Arc;

use tracing::error;

use super::ports::EventPublisher;
use super::{DomainEvent, Transaction};

/// Defers [`EventPublisher::publish_event`] calls to after commit.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use bookshelf::domain::ports::{FixtureTransactionManager, NoOpEventPublisher};
/// use bookshelf::domain::{DomainEvent, Transaction, TransactionalEventPublisher};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let publisher = TransactionalEventPublisher::new(Arc::new(NoOpEventPublisher));
/// let mut tx = Transaction::begin(&FixtureTransactionManager).await?;
/// publisher.publish_after_commit(&mut tx, DomainEvent::new("book_updated", chrono::Utc::now()));
/// assert_eq!(tx.pending_after_commit(), 1);
/// tx.commit().await?.run().await;
/// # Ok::<(), bookshelf::domain::ports::TransactionError>(())
/// # });
/// ```
#[derive(Clone)]
pub struct TransactionalEventPublisher {
    publisher: Arc<dyn EventPublisher>,
}

impl TransactionalEventPublisher {
    /// Publish through `publisher`.
    #[must_use]
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Queue `event` for delivery after `tx` commits.
    ///
    /// Events queued on the same transaction are delivered in call order.
    pub fn publish_after_commit(&self, tx: &mut Transaction, event: DomainEvent) {
        let publisher = Arc::clone(&self.publisher);
        let transaction = tx.id();
        tx.after_commit(move || {
            Box::pin(async move {
                if let Err(err) = publisher.publish_event(&event).await {
                    error!(
                        event_id = %event.event_id,
                        event_type = %event.event_type,
                        %transaction,
                        error = %err,
                        "failed to publish domain event after commit; not retried"
                    );
                }
            })
        });
    }
}
