//! Retention configuration for idempotency records.

use std::time::Duration;

/// Configuration for idempotency retention and sweeping.
///
/// Records live for the retention window: until then a started record blocks
/// concurrent duplicates and a finished record replays. The sweeper deletes
/// anything older than the window every `sweep_interval`.
///
/// # Example
///
/// ```
/// # use bookshelf::domain::idempotency::IdempotencyConfig;
/// # use std::time::Duration;
/// let config = IdempotencyConfig::default();
/// assert_eq!(config.retention(), Duration::from_secs(48 * 3600));
///
/// let custom = IdempotencyConfig::from_hours(12, 600);
/// assert_eq!(custom.retention(), Duration::from_secs(12 * 3600));
/// assert_eq!(custom.sweep_interval(), Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyConfig {
    retention: Duration,
    sweep_interval: Duration,
}

impl IdempotencyConfig {
    /// Default retention in hours.
    pub const DEFAULT_RETENTION_HOURS: u64 = 48;

    /// Default sweep interval in seconds.
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

    /// Minimum allowed retention in hours.
    ///
    /// Shorter windows would let records expire before client retries land.
    const MIN_RETENTION_HOURS: u64 = 1;

    /// Maximum allowed retention in hours (10 years).
    const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;

    /// Minimum sweep interval in seconds.
    const MIN_SWEEP_INTERVAL_SECS: u64 = 1;

    /// Build from raw settings, clamping out-of-range values.
    ///
    /// Retention is clamped to [1, 87600] hours and the sweep interval to at
    /// least one second.
    #[must_use]
    pub fn from_hours(retention_hours: u64, sweep_interval_secs: u64) -> Self {
        let hours = retention_hours.clamp(Self::MIN_RETENTION_HOURS, Self::MAX_RETENTION_HOURS);
        Self {
            retention: Duration::from_secs(hours.saturating_mul(3600)),
            sweep_interval: Duration::from_secs(
                sweep_interval_secs.max(Self::MIN_SWEEP_INTERVAL_SECS),
            ),
        }
    }

    /// Create with an explicit retention window (for testing).
    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    /// Returns the retention window.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        self.retention
    }

    /// Returns the interval between retention sweeps.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self::from_hours(
            Self::DEFAULT_RETENTION_HOURS,
            Self::DEFAULT_SWEEP_INTERVAL_SECS,
        )
    }
}
