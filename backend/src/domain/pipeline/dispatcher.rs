//! Routes commands to the pipeline matching their deduplication policy.

use std::sync::Arc;

use super::{Pipeline, PipelinePorts};
use crate::domain::{Command, CommandHandler, Error, IdempotencyKey};

/// Holds both standard pipelines and picks one per submission.
///
/// Commands submitted with a key and [`Command::DEDUPLICATE`] set run through
/// [`Pipeline::standard`]. Everything else runs through
/// [`Pipeline::without_idempotency`]: without a key there is no earlier
/// submission to match.
#[derive(Clone)]
pub struct CommandDispatcher {
    deduplicated: Pipeline,
    direct: Pipeline,
}

impl CommandDispatcher {
    /// Build both standard pipelines from `ports`.
    #[must_use]
    pub fn new(ports: &PipelinePorts) -> Self {
        Self::from_pipelines(
            Pipeline::standard(ports),
            Pipeline::without_idempotency(ports),
        )
    }

    /// Use explicit pipelines.
    #[must_use]
    pub fn from_pipelines(deduplicated: Pipeline, direct: Pipeline) -> Self {
        Self {
            deduplicated,
            direct,
        }
    }

    fn keyed_pipeline_for<C: Command>(&self) -> &Pipeline {
        if C::DEDUPLICATE {
            &self.deduplicated
        } else {
            &self.direct
        }
    }

    /// Dispatch `command` once, without deduplication.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error unchanged.
    pub async fn dispatch<C, H>(&self, command: C, handler: Arc<H>) -> Result<C::Output, Error>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        self.direct.process(command, handler).await
    }

    /// Dispatch `command` under a caller-supplied idempotency key.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error unchanged.
    pub async fn dispatch_with_key<C, H>(
        &self,
        command: C,
        key: IdempotencyKey,
        handler: Arc<H>,
    ) -> Result<C::Output, Error>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        self.keyed_pipeline_for::<C>()
            .process_with_key(command, key, handler)
            .await
    }
}
