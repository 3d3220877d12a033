//! Exponential backoff schedule
//!
//! Only the delay math lives here. The async retry loop that consults this
//! schedule belongs to the HTTP client, which knows how to classify failures
//! and how to cancel a pending backoff.
//!
//! # Example
//!
//! ```rust
//! use glow_core::retry::RetryConfig;
//! use std::time::Duration;
//!
//! let config = RetryConfig::new(3, Duration::from_millis(100));
//! let delays: Vec<_> = config.schedule().collect();
//! assert_eq!(
//!     delays,
//!     vec![
//!         Duration::from_millis(100),
//!         Duration::from_millis(200),
//!         Duration::from_millis(400),
//!     ]
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Ceiling applied to every computed delay
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Doubling schedule with the given retry budget and base delay
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Create a config for quick retries (local development)
    #[must_use]
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }

    /// Create a config with no retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Total number of attempts this budget allows
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait before the given retry (1-based)
    ///
    /// Retry 0 is the initial attempt and never waits.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        // Whole nanoseconds keep 100ms * 2 at exactly 200ms.
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let base_nanos = self.base_delay.as_nanos() as f64;
        let max_nanos = self.max_delay.as_nanos() as f64;
        let delay_nanos = (base_nanos * self.backoff_multiplier.powi(exponent)).min(max_nanos);

        if delay_nanos.is_finite() && delay_nanos >= 0.0 {
            Duration::from_nanos(delay_nanos.round() as u64)
        } else {
            self.max_delay
        }
    }

    /// Iterate over every backoff delay in order
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_retries).map(|retry| self.delay_for_retry(retry))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
