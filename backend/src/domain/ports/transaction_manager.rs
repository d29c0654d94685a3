//! Port for opening units of work against the backing store.
//!
//! The domain never sees connections or sessions. A [`TransactionManager`]
//! hands out a boxed [`TransactionBackend`] which the domain wraps in a
//! [`crate::domain::Transaction`]; the wrapper owns the ordering of staged
//! writes and after-commit actions, while the backend only has to commit or
//! roll back.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised while driving a unit of work.
    pub enum TransactionError {
        /// The backing store refused to open a transaction.
        Begin { message: String } => "failed to begin transaction: {message}",
        /// The backing store failed to make the unit of work durable.
        Commit { message: String } => "failed to commit transaction: {message}",
        /// Discarding the unit of work failed.
        Rollback { message: String } => "failed to roll back transaction: {message}",
    }
}

/// Opens transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Begin a new unit of work.
    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, TransactionError>;
}

/// Adapter side of one open transaction.
///
/// Both methods consume the backend so a unit of work ends exactly once.
#[async_trait]
pub trait TransactionBackend: Send {
    /// Make every write performed through this backend durable.
    async fn commit(self: Box<Self>) -> Result<(), TransactionError>;

    /// Discard every write performed through this backend.
    async fn rollback(self: Box<Self>) -> Result<(), TransactionError>;
}

/// Backend with nothing to flush; used when all writes are staged in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTransactionBackend;

#[async_trait]
impl TransactionBackend for NoOpTransactionBackend {
    async fn commit(self: Box<Self>) -> Result<(), TransactionError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), TransactionError> {
        Ok(())
    }
}

/// Fixture manager whose transactions always commit.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTransactionManager;

#[async_trait]
impl TransactionManager for FixtureTransactionManager {
    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, TransactionError> {
        Ok(Box::new(NoOpTransactionBackend))
    }
}
