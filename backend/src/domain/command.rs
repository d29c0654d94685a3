//! Command and handler contracts for the execution pipeline.
//!
//! A [`Command`] is an immutable typed request. Its serialised form drives
//! idempotency key derivation and payload conflict detection, and its output
//! is stored verbatim so a replay returns exactly what the first execution
//! returned.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Error;
use super::pipeline::CommandContext;

/// Typed write request dispatched through a [`crate::domain::Pipeline`].
///
/// # Examples
/// ```
/// use bookshelf::domain::Command;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct RenameShelf {
///     name: String,
/// }
///
/// impl Command for RenameShelf {
///     type Output = ();
///     const NAME: &'static str = "rename_shelf";
/// }
///
/// assert!(RenameShelf::DEDUPLICATE);
/// ```
pub trait Command: Serialize + Send + 'static {
    /// Result returned to the caller and stored for replays.
    type Output: Serialize + DeserializeOwned + Send + 'static;

    /// Stable command name used for spans and metrics labels.
    const NAME: &'static str;

    /// Whether the command runs through idempotency-key deduplication.
    const DEDUPLICATE: bool = true;
}

/// Business logic for one command type.
///
/// Handlers run innermost in the pipeline, inside the transaction opened for
/// the invocation; they reach it through [`CommandContext::transaction_mut`].
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Execute `command`.
    async fn handle(&self, command: C, ctx: &mut CommandContext) -> Result<C::Output, Error>;
}
