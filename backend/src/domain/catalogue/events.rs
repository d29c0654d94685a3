//! Catalogue domain events.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{Author, Book, BookId, BookStatus};
use crate::domain::DomainEvent;

/// Event type of [`CatalogueEvent::AuthorCreated`].
pub const AUTHOR_CREATED: &str = "author_created";
/// Event type of [`CatalogueEvent::BookUpdated`].
pub const BOOK_UPDATED: &str = "book_updated";
/// Event type of [`CatalogueEvent::BookStatusChanged`].
pub const BOOK_STATUS_CHANGED: &str = "book_status_changed";
/// Event type of [`CatalogueEvent::BookDeleted`].
pub const BOOK_DELETED: &str = "book_deleted";

/// Changes the catalogue announces after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogueEvent {
    /// An author was registered.
    AuthorCreated(Author),
    /// A book was created or its title changed.
    BookUpdated(Book),
    /// A book moved between statuses.
    BookStatusChanged {
        /// The book after the change.
        book: Book,
        /// Status before the change.
        from: BookStatus,
    },
    /// A book was removed.
    BookDeleted(BookId),
}

impl CatalogueEvent {
    /// String discriminator of this event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::AuthorCreated(_) => AUTHOR_CREATED,
            Self::BookUpdated(_) => BOOK_UPDATED,
            Self::BookStatusChanged { .. } => BOOK_STATUS_CHANGED,
            Self::BookDeleted(_) => BOOK_DELETED,
        }
    }

    /// Render as a [`DomainEvent`] that occurred at `at`.
    #[must_use]
    pub fn into_domain_event(self, at: DateTime<Utc>) -> DomainEvent {
        let event = DomainEvent::new(self.event_type(), at);
        match self {
            Self::AuthorCreated(author) => event
                .with("authorId", json!(author.id))
                .with("fullName", json!(author.full_name)),
            Self::BookUpdated(book) => event
                .with("bookId", json!(book.id))
                .with("title", json!(book.title))
                .with("authorIds", json!(book.author_ids)),
            Self::BookStatusChanged { book, from } => event
                .with("bookId", json!(book.id))
                .with("title", json!(book.title))
                .with("authorIds", json!(book.author_ids))
                .with("from", json!(from.as_str()))
                .with("to", json!(book.status.as_str())),
            Self::BookDeleted(book_id) => event.with("bookId", json!(book_id)),
        }
    }
}
