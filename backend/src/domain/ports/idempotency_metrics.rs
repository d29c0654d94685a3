//! Domain port for recording idempotency outcomes.
//!
//! The idempotency middleware reports every claim attempt through this port
//! without knowing whether the figures end up in logs, a metrics exporter or
//! nowhere at all. Recording failures never fail the command.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording idempotency metrics.
    pub enum IdempotencyMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "idempotency metrics exporter failed: {message}",
    }
}

/// Labels attached to every idempotency metric write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyMetricLabels {
    /// Command whose key was claimed.
    pub command: String,
    /// Age bucket of the existing record (for example `"1-5m"`).
    /// `None` for misses, where no prior record exists.
    pub age_bucket: Option<String>,
}

impl IdempotencyMetricLabels {
    /// Labels for a claim with no prior record.
    #[must_use]
    pub fn miss(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            age_bucket: None,
        }
    }

    /// Labels for a claim that found a record `age` old.
    #[must_use]
    pub fn existing(command: impl Into<String>, age: chrono::TimeDelta) -> Self {
        Self {
            command: command.into(),
            age_bucket: Some(age_bucket(age).to_owned()),
        }
    }
}

/// Bucket a record age into a small set of label values.
#[must_use]
pub fn age_bucket(age: chrono::TimeDelta) -> &'static str {
    match age.num_seconds() {
        i64::MIN..60 => "0-1m",
        60..300 => "1-5m",
        300..1800 => "5-30m",
        1800..7200 => "30m-2h",
        7200..86400 => "2h-24h",
        _ => "24h+",
    }
}

/// Metrics recording port for idempotency claim outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyMetrics: Send + Sync {
    /// Record a miss: the key was new and the command executed.
    async fn record_miss(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError>;

    /// Record a hit: a finished result was replayed.
    async fn record_hit(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError>;

    /// Record a conflict: the key was reused with a different payload.
    async fn record_conflict(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError>;

    /// Record a duplicate arriving while the first invocation still runs.
    async fn record_in_progress(
        &self,
        labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpIdempotencyMetrics;

#[async_trait]
impl IdempotencyMetrics for NoOpIdempotencyMetrics {
    async fn record_miss(
        &self,
        _labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        Ok(())
    }

    async fn record_hit(
        &self,
        _labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        Ok(())
    }

    async fn record_conflict(
        &self,
        _labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        Ok(())
    }

    async fn record_in_progress(
        &self,
        _labels: &IdempotencyMetricLabels,
    ) -> Result<(), IdempotencyMetricsError> {
        Ok(())
    }
}
