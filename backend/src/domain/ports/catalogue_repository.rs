//! Port for reading and writing the book catalogue.
//!
//! Reads see committed state only. Writes take the caller's
//! [`Transaction`] and become visible once it commits; a rolled-back
//! transaction leaves the catalogue untouched.

use async_trait::async_trait;

use crate::domain::{Author, AuthorId, Book, BookId, Subscription, Transaction};

use super::define_port_error;

define_port_error! {
    /// Errors raised by catalogue repository adapters.
    pub enum CatalogueRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "catalogue connection failed: {message}",
        /// Query failed during execution or row conversion.
        Query { message: String } =>
            "catalogue query failed: {message}",
    }
}

/// Port for catalogue persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogueRepository: Send + Sync {
    /// Fetch an author by id.
    async fn find_author(&self, id: &AuthorId) -> Result<Option<Author>, CatalogueRepositoryError>;

    /// Fetch a book by id.
    async fn find_book(&self, id: &BookId) -> Result<Option<Book>, CatalogueRepositoryError>;

    /// Return every subscription to any of `author_ids`, ordered by author
    /// then phone number, without duplicates.
    async fn subscriptions_for(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<Vec<Subscription>, CatalogueRepositoryError>;

    /// Insert or replace an author.
    async fn save_author(
        &self,
        tx: &mut Transaction,
        author: &Author,
    ) -> Result<(), CatalogueRepositoryError>;

    /// Insert or replace a book.
    async fn save_book(
        &self,
        tx: &mut Transaction,
        book: &Book,
    ) -> Result<(), CatalogueRepositoryError>;

    /// Remove a book.
    async fn delete_book(
        &self,
        tx: &mut Transaction,
        id: &BookId,
    ) -> Result<(), CatalogueRepositoryError>;

    /// Record a subscription. Repeating an existing subscription is a no-op.
    async fn save_subscription(
        &self,
        tx: &mut Transaction,
        subscription: &Subscription,
    ) -> Result<(), CatalogueRepositoryError>;
}
