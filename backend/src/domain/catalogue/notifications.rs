//! Fan-out of publication notices to author subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::{Value, json};
use tracing::debug;

use super::events::BOOK_STATUS_CHANGED;
use super::{AuthorId, BookStatus};
use crate::domain::ports::{CatalogueRepository, EventPublishError, EventPublisher, JobQueue};
use crate::domain::{DomainEvent, Job};

/// Job kind pushed once per subscriber when a book is published.
pub const NOTIFY_SUBSCRIBER_JOB: &str = "notify_subscriber";

/// Turns "book published" events into one notification job per subscriber
/// of the book's authors.
///
/// Sending the notification is the worker's business; this publisher only
/// enqueues. Every other event is ignored.
pub struct SubscriberNotifier {
    repository: Arc<dyn CatalogueRepository>,
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
}

impl SubscriberNotifier {
    /// Look subscribers up in `repository` and enqueue on `queue`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn CatalogueRepository>,
        queue: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            queue,
            clock,
        }
    }
}

fn is_publication(event: &DomainEvent) -> bool {
    event.event_type == BOOK_STATUS_CHANGED
        && event.str_attribute("to") == Some(BookStatus::Published.as_str())
}

fn author_ids(event: &DomainEvent) -> Result<Vec<AuthorId>, EventPublishError> {
    let raw = event.payload.get("authorIds").cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|err| {
        EventPublishError::rejected(format!(
            "event {} has malformed authorIds: {err}",
            event.event_id
        ))
    })
}

#[async_trait]
impl EventPublisher for SubscriberNotifier {
    async fn publish_event(&self, event: &DomainEvent) -> Result<(), EventPublishError> {
        if !is_publication(event) {
            return Ok(());
        }

        let authors = author_ids(event)?;
        let subscriptions = self
            .repository
            .subscriptions_for(&authors)
            .await
            .map_err(|err| EventPublishError::unavailable(err.to_string()))?;

        let book_id = event.payload.get("bookId").cloned().unwrap_or(Value::Null);
        let title = event.payload.get("title").cloned().unwrap_or(Value::Null);
        for subscription in &subscriptions {
            let job = Job::new(
                NOTIFY_SUBSCRIBER_JOB,
                json!({
                    "phone": subscription.phone,
                    "authorId": subscription.author_id,
                    "bookId": book_id,
                    "title": title,
                }),
                self.clock.utc(),
            );
            self.queue
                .push(job)
                .await
                .map_err(|err| EventPublishError::unavailable(err.to_string()))?;
        }
        debug!(
            event_id = %event.event_id,
            notified = subscriptions.len(),
            "queued subscriber notifications"
        );
        Ok(())
    }
}
