//! Transaction manager for the in-memory adapters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{TransactionBackend, TransactionError, TransactionManager};

/// Opens transactions whose writes live entirely in the domain
/// [`crate::domain::Transaction`] staging buffer.
///
/// The backend has nothing to flush, so commit and rollback only record the
/// outcome.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionManager {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl InMemoryTransactionManager {
    /// Create a manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions committed so far.
    pub fn committed(&self) -> u64 {
        self.counters.committed.load(Ordering::Relaxed)
    }

    /// Transactions rolled back so far.
    pub fn rolled_back(&self) -> u64 {
        self.counters.rolled_back.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransactionManager for InMemoryTransactionManager {
    async fn begin(&self) -> Result<Box<dyn TransactionBackend>, TransactionError> {
        Ok(Box::new(InMemoryBackend {
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct InMemoryBackend {
    counters: Arc<Counters>,
}

#[async_trait]
impl TransactionBackend for InMemoryBackend {
    async fn commit(self: Box<Self>) -> Result<(), TransactionError> {
        let total = self.counters.committed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(committed = total, "in-memory backend committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), TransactionError> {
        let total = self.counters.rolled_back.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(rolled_back = total, "in-memory backend rolled back");
        Ok(())
    }
}
