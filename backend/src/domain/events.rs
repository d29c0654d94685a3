//! Domain events and background jobs.
//!
//! A [`DomainEvent`] describes something that already happened inside a
//! committed transaction. A [`Job`] is work handed to an out-of-process
//! worker through the [`crate::domain::ports::JobQueue`] port.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Immutable record of a state change.
///
/// # Examples
/// ```
/// use bookshelf::domain::DomainEvent;
/// use chrono::Utc;
/// use serde_json::json;
///
/// let event = DomainEvent::new("book_updated", Utc::now())
///     .with("bookId", json!("b-1"))
///     .with("title", json!("Dune"));
/// assert_eq!(event.event_type, "book_updated");
/// assert_eq!(event.payload.get("title"), Some(&json!("Dune")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Unique identifier of this occurrence.
    pub event_id: Uuid,
    /// String discriminator, for example `"book_status_changed"`.
    pub event_type: String,
    /// Event attributes.
    pub payload: BTreeMap<String, Value>,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Start an event of `event_type` with an empty payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            payload: BTreeMap::new(),
            occurred_at,
        }
    }

    /// Add a payload attribute.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Read a string payload attribute.
    #[must_use]
    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Worker routing key, for example `"notify_subscriber"`.
    pub kind: String,
    /// Job arguments.
    pub payload: Value,
    /// When the job was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    /// Build a job with a fresh identifier.
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Value, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            payload,
            enqueued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_serializes_with_camel_case_fields() {
        let event = DomainEvent::new("author_created", Utc::now()).with("authorId", json!("a-1"));
        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["eventType"], json!("author_created"));
        assert_eq!(value["payload"]["authorId"], json!("a-1"));
        assert!(value.get("occurredAt").is_some());
    }

    #[test]
    fn str_attribute_ignores_non_strings() {
        let event = DomainEvent::new("book_updated", Utc::now()).with("year", json!(1965));
        assert_eq!(event.str_attribute("year"), None);
        assert_eq!(event.str_attribute("missing"), None);
    }
}
