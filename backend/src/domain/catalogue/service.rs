//! Catalogue command handlers.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;

use super::{
    Author, AuthorId, Book, BookId, BookStatus, CatalogueEvent, ChangeBookStatus, CreateAuthor,
    CreateBook, DeleteBook, SubscribeToAuthor, Subscription, UpdateBookTitle,
};
use crate::domain::pipeline::CommandContext;
use crate::domain::ports::{CatalogueRepository, CatalogueRepositoryError};
use crate::domain::{CommandHandler, Error, TransactionalEventPublisher};

/// Handles every catalogue command.
///
/// Writes go through the invocation's transaction; events are queued with
/// [`TransactionalEventPublisher`] so subscribers only hear about committed
/// changes.
#[derive(Clone)]
pub struct CatalogueService {
    repository: Arc<dyn CatalogueRepository>,
    events: TransactionalEventPublisher,
    clock: Arc<dyn Clock>,
}

impl CatalogueService {
    /// Create a service over `repository`, announcing changes via `events`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn CatalogueRepository>,
        events: TransactionalEventPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            events,
            clock,
        }
    }

    async fn load_book(&self, id: &BookId) -> Result<Book, Error> {
        self.repository
            .find_book(id)
            .await
            .map_err(repository_unavailable)?
            .ok_or_else(|| Error::not_found(format!("book {id} not found")).with_field("bookId"))
    }

    async fn ensure_author(&self, id: &AuthorId) -> Result<(), Error> {
        let author = self
            .repository
            .find_author(id)
            .await
            .map_err(repository_unavailable)?;
        match author {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("author {id} not found")).with_field("authorIds")),
        }
    }

    fn announce(&self, ctx: &mut CommandContext, event: CatalogueEvent) -> Result<(), Error> {
        let event = event.into_domain_event(self.clock.utc());
        let tx = ctx.transaction_mut()?;
        self.events.publish_after_commit(tx, event);
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<CreateAuthor> for CatalogueService {
    async fn handle(
        &self,
        command: CreateAuthor,
        ctx: &mut CommandContext,
    ) -> Result<Author, Error> {
        let author = Author {
            id: AuthorId::random(),
            full_name: command.full_name,
        };
        self.repository
            .save_author(ctx.transaction_mut()?, &author)
            .await
            .map_err(repository_unavailable)?;
        self.announce(ctx, CatalogueEvent::AuthorCreated(author.clone()))?;
        Ok(author)
    }
}

#[async_trait]
impl CommandHandler<CreateBook> for CatalogueService {
    async fn handle(&self, command: CreateBook, ctx: &mut CommandContext) -> Result<Book, Error> {
        if command.author_ids.is_empty() {
            return Err(
                Error::invalid_request("a book needs at least one author").with_field("authorIds"),
            );
        }
        for author_id in &command.author_ids {
            self.ensure_author(author_id).await?;
        }

        let book = Book {
            id: BookId::random(),
            title: command.title,
            isbn: command.isbn,
            year: command.year,
            author_ids: command.author_ids,
            status: BookStatus::Draft,
        };
        self.repository
            .save_book(ctx.transaction_mut()?, &book)
            .await
            .map_err(repository_unavailable)?;
        self.announce(ctx, CatalogueEvent::BookUpdated(book.clone()))?;
        Ok(book)
    }
}

#[async_trait]
impl CommandHandler<UpdateBookTitle> for CatalogueService {
    async fn handle(
        &self,
        command: UpdateBookTitle,
        ctx: &mut CommandContext,
    ) -> Result<Book, Error> {
        let mut book = self.load_book(&command.book_id).await?;
        if book.status == BookStatus::Archived {
            return Err(Error::conflict("archived books cannot be edited").with_field("status"));
        }
        book.title = command.title;
        self.repository
            .save_book(ctx.transaction_mut()?, &book)
            .await
            .map_err(repository_unavailable)?;
        self.announce(ctx, CatalogueEvent::BookUpdated(book.clone()))?;
        Ok(book)
    }
}

#[async_trait]
impl CommandHandler<ChangeBookStatus> for CatalogueService {
    async fn handle(
        &self,
        command: ChangeBookStatus,
        ctx: &mut CommandContext,
    ) -> Result<Book, Error> {
        let mut book = self.load_book(&command.book_id).await?;
        let from = book.status;
        if !from.can_transition_to(command.status) {
            return Err(Error::conflict(format!(
                "book cannot move from {from} to {}",
                command.status
            ))
            .with_field("status"));
        }
        book.status = command.status;
        self.repository
            .save_book(ctx.transaction_mut()?, &book)
            .await
            .map_err(repository_unavailable)?;
        self.announce(
            ctx,
            CatalogueEvent::BookStatusChanged {
                book: book.clone(),
                from,
            },
        )?;
        Ok(book)
    }
}

#[async_trait]
impl CommandHandler<SubscribeToAuthor> for CatalogueService {
    async fn handle(
        &self,
        command: SubscribeToAuthor,
        ctx: &mut CommandContext,
    ) -> Result<Subscription, Error> {
        self.ensure_author(&command.author_id)
            .await
            .map_err(|err| err.with_field("authorId"))?;
        let subscription = Subscription {
            author_id: command.author_id,
            phone: command.phone,
        };
        self.repository
            .save_subscription(ctx.transaction_mut()?, &subscription)
            .await
            .map_err(repository_unavailable)?;
        Ok(subscription)
    }
}

#[async_trait]
impl CommandHandler<DeleteBook> for CatalogueService {
    async fn handle(&self, command: DeleteBook, ctx: &mut CommandContext) -> Result<(), Error> {
        let book = self.load_book(&command.book_id).await?;
        self.repository
            .delete_book(ctx.transaction_mut()?, &book.id)
            .await
            .map_err(repository_unavailable)?;
        self.announce(ctx, CatalogueEvent::BookDeleted(book.id))
    }
}

fn repository_unavailable(err: CatalogueRepositoryError) -> Error {
    Error::service_unavailable(err.to_string())
}
