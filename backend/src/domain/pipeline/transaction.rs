//! Innermost stage: one unit of work around the handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};

use super::{CommandContext, Middleware, Next};
use crate::domain::ports::{TransactionError, TransactionManager};
use crate::domain::{Error, Transaction};

/// Begins a transaction, runs the inner stages, then commits or rolls back.
///
/// On success the enlisted commit participants are prepared, the transaction
/// commits, and its after-commit actions run once commit has returned. On
/// failure the transaction rolls back and the original error is returned
/// unchanged. A context that already holds a transaction is rejected.
pub struct TransactionMiddleware {
    transactions: Arc<dyn TransactionManager>,
}

impl TransactionMiddleware {
    /// Open transactions through `transactions`.
    #[must_use]
    pub fn new(transactions: Arc<dyn TransactionManager>) -> Self {
        Self { transactions }
    }
}

#[async_trait]
impl Middleware for TransactionMiddleware {
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn opens_transaction(&self) -> bool {
        true
    }

    async fn process(&self, ctx: &mut CommandContext, next: Next<'_>) -> Result<Value, Error> {
        if ctx.in_transaction() {
            return Err(Error::internal(format!(
                "command {} attempted to open a nested transaction",
                ctx.command_name()
            )));
        }

        let tx = Transaction::begin(self.transactions.as_ref())
            .await
            .map_err(unavailable)?;
        ctx.attach_transaction(tx)?;

        let outcome = next.run(ctx).await;
        let Some(mut tx) = ctx.detach_transaction() else {
            return Err(Error::internal(format!(
                "transaction for command {} was detached before completion",
                ctx.command_name()
            )));
        };
        let participants = ctx.take_participants();

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                roll_back(tx, ctx.command_name()).await;
                return Err(err);
            }
        };

        for participant in &participants {
            if let Err(err) = participant.prepare(&mut tx, &value).await {
                roll_back(tx, ctx.command_name()).await;
                return Err(err);
            }
        }

        match tx.commit().await {
            Ok(post_commit) => {
                post_commit.run().await;
                Ok(value)
            }
            Err(err) => {
                error!(command = ctx.command_name(), error = %err, "commit failed");
                Err(unavailable(err))
            }
        }
    }
}

async fn roll_back(tx: Transaction, command: &str) {
    if let Err(err) = tx.rollback().await {
        warn!(command, error = %err, "rollback failed");
    }
}

fn unavailable(err: TransactionError) -> Error {
    Error::service_unavailable(err.to_string())
}
