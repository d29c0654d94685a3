//! Daemon settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `BOOKSHELF_*` environment variables and
//! configuration files, in OrthoConfig's usual precedence.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::IdempotencyConfig;

/// Runtime settings for the `bookshelf` daemon.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BOOKSHELF")]
pub struct AppSettings {
    /// How long idempotency records block duplicates and replay results.
    #[ortho_config(default = 48)]
    pub idempotency_retention_hours: u64,
    /// Seconds between idempotency retention sweeps.
    #[ortho_config(default = 3600)]
    pub sweep_interval_secs: u64,
    /// Seconds between logged health reports.
    #[ortho_config(default = 60)]
    pub health_report_interval_secs: u64,
    /// Queue depth above which the job queue reports unhealthy.
    #[ortho_config(default = 10_000)]
    pub queue_depth_threshold: usize,
}

impl AppSettings {
    /// Idempotency retention derived from these settings.
    ///
    /// Out-of-range values are clamped; see [`IdempotencyConfig::from_hours`].
    #[must_use]
    pub fn idempotency_config(&self) -> IdempotencyConfig {
        IdempotencyConfig::from_hours(self.idempotency_retention_hours, self.sweep_interval_secs)
    }

    /// Interval between health reports, at least one second.
    #[must_use]
    pub fn health_report_interval(&self) -> Duration {
        Duration::from_secs(self.health_report_interval_secs.max(1))
    }
}
