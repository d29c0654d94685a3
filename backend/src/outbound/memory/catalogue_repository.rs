//! In-memory catalogue repository.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{CatalogueRepository, CatalogueRepositoryError};
use crate::domain::{Author, AuthorId, Book, BookId, Subscription, Transaction};

#[derive(Debug, Default)]
struct CatalogueState {
    authors: HashMap<AuthorId, Author>,
    books: HashMap<BookId, Book>,
    subscriptions: BTreeSet<Subscription>,
}

/// [`CatalogueRepository`] backed by process memory.
///
/// Reads see committed state. Writes are staged on the caller's transaction
/// and applied when it commits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogueRepository {
    state: Arc<Mutex<CatalogueState>>,
}

impl InMemoryCatalogueRepository {
    /// Create an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed books.
    pub fn book_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.books.len())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<MutexGuard<'_, CatalogueState>, CatalogueRepositoryError> {
        self.state
            .lock()
            .map_err(|_| CatalogueRepositoryError::query("catalogue lock poisoned"))
    }

    fn stage(
        &self,
        tx: &mut Transaction,
        write: impl FnOnce(&mut CatalogueState) + Send + 'static,
    ) {
        let state = Arc::clone(&self.state);
        tx.stage(move || {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            write(&mut state);
        });
    }
}

#[async_trait]
impl CatalogueRepository for InMemoryCatalogueRepository {
    async fn find_author(&self, id: &AuthorId) -> Result<Option<Author>, CatalogueRepositoryError> {
        Ok(self.read()?.authors.get(id).cloned())
    }

    async fn find_book(&self, id: &BookId) -> Result<Option<Book>, CatalogueRepositoryError> {
        Ok(self.read()?.books.get(id).cloned())
    }

    async fn subscriptions_for(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<Vec<Subscription>, CatalogueRepositoryError> {
        let state = self.read()?;
        Ok(state
            .subscriptions
            .iter()
            .filter(|subscription| author_ids.contains(&subscription.author_id))
            .cloned()
            .collect())
    }

    async fn save_author(
        &self,
        tx: &mut Transaction,
        author: &Author,
    ) -> Result<(), CatalogueRepositoryError> {
        let author = author.clone();
        self.stage(tx, move |state| {
            state.authors.insert(author.id, author);
        });
        Ok(())
    }

    async fn save_book(
        &self,
        tx: &mut Transaction,
        book: &Book,
    ) -> Result<(), CatalogueRepositoryError> {
        let book = book.clone();
        self.stage(tx, move |state| {
            state.books.insert(book.id, book);
        });
        Ok(())
    }

    async fn delete_book(
        &self,
        tx: &mut Transaction,
        id: &BookId,
    ) -> Result<(), CatalogueRepositoryError> {
        let id = *id;
        self.stage(tx, move |state| {
            state.books.remove(&id);
        });
        Ok(())
    }

    async fn save_subscription(
        &self,
        tx: &mut Transaction,
        subscription: &Subscription,
    ) -> Result<(), CatalogueRepositoryError> {
        let subscription = subscription.clone();
        self.stage(tx, move |state| {
            state.subscriptions.insert(subscription);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookStatus;
    use crate::domain::ports::FixtureTransactionManager;
    use rstest::{fixture, rstest};

    #[fixture]
    fn repository() -> InMemoryCatalogueRepository {
        InMemoryCatalogueRepository::new()
    }

    fn author(name: &str) -> Author {
        Author {
            id: AuthorId::random(),
            full_name: name.to_owned(),
        }
    }

    fn book(author: &Author) -> Book {
        Book {
            id: BookId::random(),
            title: "The Left Hand of Darkness".to_owned(),
            isbn: None,
            year: Some(1969),
            author_ids: vec![author.id],
            status: BookStatus::Draft,
        }
    }

    async fn begin() -> Transaction {
        Transaction::begin(&FixtureTransactionManager)
            .await
            .expect("begin")
    }

    #[rstest]
    #[tokio::test]
    async fn writes_appear_after_commit(repository: InMemoryCatalogueRepository) {
        let le_guin = author("Ursula K. Le Guin");
        let novel = book(&le_guin);
        let mut tx = begin().await;

        repository.save_author(&mut tx, &le_guin).await.expect("save author");
        repository.save_book(&mut tx, &novel).await.expect("save book");
        assert_eq!(repository.find_book(&novel.id).await.expect("read"), None);

        tx.commit().await.expect("commit").run().await;

        assert_eq!(
            repository.find_author(&le_guin.id).await.expect("read"),
            Some(le_guin)
        );
        assert_eq!(
            repository.find_book(&novel.id).await.expect("read"),
            Some(novel)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn rollback_discards_writes(repository: InMemoryCatalogueRepository) {
        let le_guin = author("Ursula K. Le Guin");
        let mut tx = begin().await;
        repository.save_book(&mut tx, &book(&le_guin)).await.expect("save");

        tx.rollback().await.expect("rollback");

        assert_eq!(repository.book_count(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn delete_removes_committed_book(repository: InMemoryCatalogueRepository) {
        let novel = book(&author("Octavia E. Butler"));
        let mut tx = begin().await;
        repository.save_book(&mut tx, &novel).await.expect("save");
        tx.commit().await.expect("commit").run().await;

        let mut tx = begin().await;
        repository.delete_book(&mut tx, &novel.id).await.expect("delete");
        tx.commit().await.expect("commit").run().await;

        assert_eq!(repository.book_count(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn subscriptions_are_filtered_and_deduplicated(repository: InMemoryCatalogueRepository) {
        let followed = AuthorId::random();
        let other = AuthorId::random();
        let mut tx = begin().await;
        for (author_id, phone) in [
            (followed, "+44 7700 900002"),
            (followed, "+44 7700 900001"),
            (followed, "+44 7700 900001"),
            (other, "+44 7700 900003"),
        ] {
            let subscription = Subscription {
                author_id,
                phone: phone.to_owned(),
            };
            repository
                .save_subscription(&mut tx, &subscription)
                .await
                .expect("subscribe");
        }
        tx.commit().await.expect("commit").run().await;

        let found = repository
            .subscriptions_for(&[followed])
            .await
            .expect("query");

        let phones: Vec<_> = found.iter().map(|s| s.phone.as_str()).collect();
        assert_eq!(phones, ["+44 7700 900001", "+44 7700 900002"]);
    }
}
