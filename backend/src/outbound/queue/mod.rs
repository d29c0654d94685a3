//! In-process job queue.
//!
//! Jobs wait in FIFO order until a worker drains them with
//! [`InMemoryJobQueue::pop_next`]. Nothing survives a restart; a broker-backed
//! adapter can replace this one behind the same [`JobQueue`] port.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::Job;
use crate::domain::ports::{JobQueue, JobQueueError};

/// FIFO [`JobQueue`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobQueue {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl InMemoryJobQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest waiting job.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Unavailable`] when the queue lock is poisoned.
    pub fn pop_next(&self) -> Result<Option<Job>, JobQueueError> {
        Ok(self.lock()?.pop_front())
    }

    /// Snapshot of the waiting jobs, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Unavailable`] when the queue lock is poisoned.
    pub fn pending(&self) -> Result<Vec<Job>, JobQueueError> {
        Ok(self.lock()?.iter().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<Job>>, JobQueueError> {
        self.jobs
            .lock()
            .map_err(|_| JobQueueError::unavailable("job queue lock poisoned"))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push(&self, job: Job) -> Result<(), JobQueueError> {
        let mut jobs = self.lock()?;
        debug!(job_id = %job.id, kind = %job.kind, depth = jobs.len() + 1, "job enqueued");
        jobs.push_back(job);
        Ok(())
    }

    async fn depth(&self) -> Result<usize, JobQueueError> {
        Ok(self.lock()?.len())
    }
}
