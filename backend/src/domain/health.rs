//! Aggregated health reporting.
//!
//! A [`HealthCheckRunner`] runs every registered [`HealthCheck`] concurrently
//! and folds the outcomes into a [`HealthReport`]. Individual checks never
//! break the report: an error or a panic inside a check becomes an unhealthy
//! entry whose details carry an `error` message.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::join_all;
use mockable::Clock;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::ports::HealthCheck;

mod checks;

pub use checks::{HealthState, IdempotencyStoreCheck, QueueDepthCheck};

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    /// Check name.
    pub name: String,
    /// Whether the check passed.
    pub healthy: bool,
    /// Wall-clock time spent in the check.
    pub latency_ms: u64,
    /// Diagnostic details; `error` is set when the check failed or panicked.
    pub details: Map<String, Value>,
}

/// Snapshot of every check, created fresh per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// True only when every check is healthy.
    pub healthy: bool,
    /// Per-check outcomes in registration order.
    pub checks: Vec<HealthCheckResult>,
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    /// Look up a check outcome by name.
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&HealthCheckResult> {
        self.checks.iter().find(|check| check.name == name)
    }
}

/// Runs health checks and aggregates their outcomes.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use bookshelf::domain::{HealthCheckRunner, HealthState};
/// use mockable::DefaultClock;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let state = Arc::new(HealthState::new());
/// let runner = HealthCheckRunner::new(Arc::new(DefaultClock)).with_check(state.clone());
///
/// assert!(!runner.run().await.healthy);
/// state.mark_ready();
/// assert!(runner.run().await.healthy);
/// # });
/// ```
#[derive(Clone)]
pub struct HealthCheckRunner {
    checks: Vec<Arc<dyn HealthCheck>>,
    clock: Arc<dyn Clock>,
}

impl HealthCheckRunner {
    /// A runner with no checks; its report is trivially healthy.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            checks: Vec::new(),
            clock,
        }
    }

    /// Register `check`.
    #[must_use]
    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Names of the registered checks in registration order.
    #[must_use]
    pub fn check_names(&self) -> Vec<String> {
        self.checks.iter().map(|check| check.name().to_owned()).collect()
    }

    /// Run every check concurrently and aggregate the results.
    pub async fn run(&self) -> HealthReport {
        let checks = join_all(self.checks.iter().map(|check| run_check(check.as_ref()))).await;
        HealthReport {
            healthy: checks.iter().all(|check| check.healthy),
            checks,
            generated_at: self.clock.utc(),
        }
    }
}

async fn run_check(check: &dyn HealthCheck) -> HealthCheckResult {
    let name = check.name().to_owned();
    let started = Instant::now();
    let outcome = AssertUnwindSafe(check.check()).catch_unwind().await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (healthy, details) = match outcome {
        Ok(Ok(status)) => (status.healthy, status.details),
        Ok(Err(err)) => {
            warn!(check = %name, error = %err, "health check failed");
            (false, error_details(err.to_string()))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(check = %name, error = %message, "health check panicked");
            (false, error_details(message))
        }
    };

    HealthCheckResult {
        name,
        healthy,
        latency_ms,
        details,
    }
}

fn error_details(message: String) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("error".to_owned(), Value::String(message));
    details
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "health check panicked".to_owned()
    }
}

#[cfg(test)]
mod tests;
