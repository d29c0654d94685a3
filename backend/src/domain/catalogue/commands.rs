//! Catalogue write commands.

use serde::{Deserialize, Serialize};

use super::{Author, AuthorId, Book, BookId, BookStatus, Subscription};
use crate::domain::Command;

/// Register a new author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthor {
    /// Display name.
    pub full_name: String,
}

impl Command for CreateAuthor {
    type Output = Author;
    const NAME: &'static str = "create_author";
}

/// Add a draft book credited to existing authors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    /// Title.
    pub title: String,
    /// ISBN, when known.
    pub isbn: Option<String>,
    /// Publication year, when known.
    pub year: Option<i32>,
    /// Credited authors; each must exist.
    pub author_ids: Vec<AuthorId>,
}

impl Command for CreateBook {
    type Output = Book;
    const NAME: &'static str = "create_book";
}

/// Rename a book that is not archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookTitle {
    /// Book to rename.
    pub book_id: BookId,
    /// New title.
    pub title: String,
}

impl Command for UpdateBookTitle {
    type Output = Book;
    const NAME: &'static str = "update_book_title";
}

/// Move a book along its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBookStatus {
    /// Book to move.
    pub book_id: BookId,
    /// Target status.
    pub status: BookStatus,
}

impl Command for ChangeBookStatus {
    type Output = Book;
    const NAME: &'static str = "change_book_status";
}

/// Follow an author's new publications by phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeToAuthor {
    /// Author to follow.
    pub author_id: AuthorId,
    /// Number to notify.
    pub phone: String,
}

impl Command for SubscribeToAuthor {
    type Output = Subscription;
    const NAME: &'static str = "subscribe_to_author";
}

/// Remove a book.
///
/// Deleting is naturally repeatable, so it skips idempotency-key
/// deduplication; a second delete reports `not_found`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBook {
    /// Book to remove.
    pub book_id: BookId,
}

impl Command for DeleteBook {
    type Output = ();
    const NAME: &'static str = "delete_book";
    const DEDUPLICATE: bool = false;
}
