//! In-memory adapters.
//!
//! Each adapter keeps its state behind a [`std::sync::Mutex`]. Transactional
//! writes are registered with [`crate::domain::Transaction::stage`] so they
//! only become visible once the unit of work commits.

mod catalogue_repository;
mod idempotency_store;
mod transaction_manager;

pub use catalogue_repository::InMemoryCatalogueRepository;
pub use idempotency_store::InMemoryIdempotencyStore;
pub use transaction_manager::InMemoryTransactionManager;
