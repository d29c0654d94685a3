//! Domain port describing queue dispatch semantics for background jobs.
use async_trait::async_trait;

use crate::domain::Job;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by the queue adapter.
    pub enum JobQueueError {
        /// Queue infrastructure is unavailable.
        Unavailable { message: String } => "job queue is unavailable: {message}",
        /// The job could not be acknowledged or persisted.
        Rejected { message: String } => "job was rejected: {message}",
    }
}

/// Enqueues jobs for downstream workers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue `job`.
    async fn push(&self, job: Job) -> Result<(), JobQueueError>;

    /// Number of jobs waiting to be picked up.
    async fn depth(&self) -> Result<usize, JobQueueError>;
}
