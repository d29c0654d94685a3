//! Port for delivering domain events to whatever consumes them.

use async_trait::async_trait;

use crate::domain::DomainEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised when an event cannot be delivered.
    pub enum EventPublishError {
        /// The downstream transport is unavailable.
        Unavailable { message: String } => "event transport is unavailable: {message}",
        /// The event was delivered but refused.
        Rejected { message: String } => "event was rejected: {message}",
    }
}

/// Publishes one domain event.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver `event`. Delivery happens at most once per call.
    async fn publish_event(&self, event: &DomainEvent) -> Result<(), EventPublishError>;
}

/// Publisher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_event(&self, _event: &DomainEvent) -> Result<(), EventPublishError> {
        Ok(())
    }
}
