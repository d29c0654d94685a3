//! Book catalogue: authors, books and subscriptions.
//!
//! Every write is a [`crate::domain::Command`] handled by
//! [`CatalogueService`] inside the command pipeline. Publishing a book
//! notifies the subscribers of its authors through [`SubscriberNotifier`].

mod commands;
mod events;
mod model;
mod notifications;
mod service;


pub use commands::{
    ChangeBookStatus, CreateAuthor, CreateBook, DeleteBook, SubscribeToAuthor, UpdateBookTitle,
};
pub use events::{
    AUTHOR_CREATED, BOOK_DELETED, BOOK_STATUS_CHANGED, BOOK_UPDATED, CatalogueEvent,
};
pub use model::{Author, AuthorId, Book, BookId, BookStatus, Subscription};
pub use notifications::{NOTIFY_SUBSCRIBER_JOB, SubscriberNotifier};
pub use service::CatalogueService;
