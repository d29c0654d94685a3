//! One unit of work per pipeline invocation.
//!
//! A [`Transaction`] wraps the adapter's [`TransactionBackend`] and owns two
//! ordered queues:
//!
//! - staged writes, applied in registration order once the backend commit
//!   succeeds;
//! - after-commit actions, returned from [`Transaction::commit`] as a
//!   [`PostCommit`] so they run strictly after commit has returned.
//!
//! ```text
//! Active ──commit──> Committed (staged writes applied, PostCommit returned)
//!   │
//!   └──rollback / drop──> Discarded (nothing applied, nothing published)
//! ```
//!
//! Both terminal operations consume the value, so a transaction ends exactly
//! once. Dropping an active transaction (for example when an invocation is
//! cancelled) behaves like a rollback for everything staged in it.

use std::fmt;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tracing::debug;
use uuid::Uuid;

use super::ports::{TransactionBackend, TransactionError, TransactionManager};

/// Write applied to in-memory state once the transaction commits.
pub type StagedWrite = Box<dyn FnOnce() + Send>;

/// Action run after a successful commit.
pub type DeferredAction = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Identifier of one transaction, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// An active unit of work.
pub struct Transaction {
    id: TransactionId,
    backend: Box<dyn TransactionBackend>,
    staged: Vec<StagedWrite>,
    after_commit: Vec<DeferredAction>,
    started_at: Instant,
}

impl Transaction {
    /// Begin a transaction through `manager`.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Begin`] when the backend refuses to open a
    /// unit of work.
    pub async fn begin(manager: &dyn TransactionManager) -> Result<Self, TransactionError> {
        let backend = manager.begin().await?;
        let tx = Self::with_backend(backend);
        debug!(transaction = %tx.id, "transaction started");
        Ok(tx)
    }

    /// Wrap an already open backend.
    #[must_use]
    pub fn with_backend(backend: Box<dyn TransactionBackend>) -> Self {
        Self {
            id: TransactionId::generate(),
            backend,
            staged: Vec::new(),
            after_commit: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Identifier of this transaction.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.id
    }

    /// Time elapsed since the transaction began.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Buffer a write until commit.
    ///
    /// Writes apply in the order they were staged, after the backend commit
    /// succeeds and before any after-commit action runs.
    pub fn stage(&mut self, write: impl FnOnce() + Send + 'static) {
        self.staged.push(Box::new(write));
    }

    /// Register an action to run after a successful commit.
    ///
    /// Actions run in registration order and are discarded on rollback.
    pub fn after_commit<F>(&mut self, action: F)
    where
        F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
    {
        self.after_commit.push(Box::new(action));
    }

    /// Number of writes waiting for commit.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Number of actions waiting for commit.
    #[must_use]
    pub fn pending_after_commit(&self) -> usize {
        self.after_commit.len()
    }

    /// Commit the unit of work.
    ///
    /// On success every staged write has been applied and the returned
    /// [`PostCommit`] holds the after-commit actions; run it once the commit
    /// result has been observed.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the commit fails. Staged writes and
    /// after-commit actions are discarded in that case.
    pub async fn commit(self) -> Result<PostCommit, TransactionError> {
        let Self {
            id,
            backend,
            staged,
            after_commit,
            started_at,
        } = self;

        backend.commit().await?;

        let applied = staged.len();
        for write in staged {
            write();
        }
        debug!(
            transaction = %id,
            applied,
            deferred = after_commit.len(),
            elapsed_ms = started_at.elapsed().as_millis(),
            "transaction committed"
        );
        Ok(PostCommit {
            actions: after_commit,
        })
    }

    /// Discard the unit of work.
    ///
    /// # Errors
    ///
    /// Returns the backend error when rollback fails. Staged writes and
    /// after-commit actions are discarded either way.
    pub async fn rollback(self) -> Result<(), TransactionError> {
        let Self {
            id,
            backend,
            staged,
            after_commit,
            ..
        } = self;
        debug!(
            transaction = %id,
            discarded_writes = staged.len(),
            discarded_actions = after_commit.len(),
            "transaction rolled back"
        );
        drop(staged);
        drop(after_commit);
        backend.rollback().await
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("staged", &self.staged.len())
            .field("after_commit", &self.after_commit.len())
            .finish_non_exhaustive()
    }
}

/// After-commit actions of a committed transaction.
#[must_use = "after-commit actions only run when `run` is awaited"]
pub struct PostCommit {
    actions: Vec<DeferredAction>,
}

impl PostCommit {
    /// Number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action sequentially in registration order.
    pub async fn run(self) {
        for action in self.actions {
            action().await;
        }
    }
}

impl fmt::Debug for PostCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostCommit")
            .field("actions", &self.actions.len())
            .finish()
    }
}
