//! Built-in health checks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::domain::IdempotencyKey;
use crate::domain::ports::{
    HealthCheck, HealthCheckError, HealthStatus, IdempotencyStore, JobQueue,
};

/// Process readiness and liveness.
///
/// Starts live but not ready. Mark it ready once adapters are wired, and
/// unhealthy when shutdown begins so probes fail before the process exits.
pub struct HealthState {
    ready: AtomicBool,
    live: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(false),
            live: AtomicBool::new(true),
        }
    }
}

impl HealthState {
    /// Create a new health state starting as not ready but live.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the service as ready.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Flag the service as unhealthy so checks fail fast during shutdown.
    pub fn mark_unhealthy(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Return readiness state.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Return liveness state.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

#[async_trait]
impl HealthCheck for HealthState {
    fn name(&self) -> &str {
        "process"
    }

    async fn check(&self) -> Result<HealthStatus, HealthCheckError> {
        let (ready, live) = (self.is_ready(), self.is_alive());
        let status = if ready && live {
            HealthStatus::healthy()
        } else {
            HealthStatus::unhealthy()
        };
        Ok(status.with_detail("ready", ready).with_detail("live", live))
    }
}

/// Confirms the idempotency store answers lookups.
pub struct IdempotencyStoreCheck {
    store: Arc<dyn IdempotencyStore>,
    probe_key: IdempotencyKey,
}

impl IdempotencyStoreCheck {
    const PROBE_KEY: &'static str = "health-probe";

    /// Probe `store` with a lookup of a reserved key.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the reserved key is a valid literal.
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Result<Self, HealthCheckError> {
        let probe_key = IdempotencyKey::new(Self::PROBE_KEY)
            .map_err(|err| HealthCheckError::failed(err.to_string()))?;
        Ok(Self { store, probe_key })
    }
}

#[async_trait]
impl HealthCheck for IdempotencyStoreCheck {
    fn name(&self) -> &str {
        "idempotency_store"
    }

    async fn check(&self) -> Result<HealthStatus, HealthCheckError> {
        self.store
            .find(&self.probe_key)
            .await
            .map(|_| HealthStatus::healthy())
            .map_err(|err| HealthCheckError::unreachable(err.to_string()))
    }
}

/// Flags a backlog when more jobs wait than `threshold`.
pub struct QueueDepthCheck {
    queue: Arc<dyn JobQueue>,
    threshold: usize,
}

impl QueueDepthCheck {
    /// Watch `queue`, reporting unhealthy above `threshold` waiting jobs.
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>, threshold: usize) -> Self {
        Self { queue, threshold }
    }
}

#[async_trait]
impl HealthCheck for QueueDepthCheck {
    fn name(&self) -> &str {
        "job_queue"
    }

    async fn check(&self) -> Result<HealthStatus, HealthCheckError> {
        let depth = self
            .queue
            .depth()
            .await
            .map_err(|err| HealthCheckError::unreachable(err.to_string()))?;
        let status = if depth <= self.threshold {
            HealthStatus::healthy()
        } else {
            HealthStatus::unhealthy()
        };
        Ok(status
            .with_detail("depth", depth)
            .with_detail("threshold", self.threshold))
    }
}
