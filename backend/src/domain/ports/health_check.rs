//! Port for a single named health probe.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::define_port_error;

define_port_error! {
    /// Errors a probe reports instead of a status.
    pub enum HealthCheckError {
        /// The probed dependency could not be reached.
        Unreachable { message: String } => "{message}",
        /// The probe itself failed.
        Failed { message: String } => "{message}",
    }
}

/// Status reported by one probe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HealthStatus {
    /// Whether the probed dependency is usable.
    pub healthy: bool,
    /// Free-form diagnostic details.
    pub details: Map<String, Value>,
}

impl HealthStatus {
    /// A healthy status without details.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            details: Map::new(),
        }
    }

    /// An unhealthy status without details.
    #[must_use]
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            details: Map::new(),
        }
    }

    /// Attach a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// A named probe run by [`crate::domain::HealthCheckRunner`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Stable name used as the report entry key.
    fn name(&self) -> &str;

    /// Probe the dependency.
    async fn check(&self) -> Result<HealthStatus, HealthCheckError>;
}
