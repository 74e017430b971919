//! Retry spacing for transient delivery failures

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::BackoffConfig;

/// Exponential backoff: `min(max, base * multiplier^(attempts - 1))`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    multiplier: u32,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, multiplier: u32, max: Duration) -> Self {
        Self {
            base,
            multiplier,
            max,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_secs(config.base_seconds),
            config.multiplier,
            Duration::from_secs(config.max_seconds),
        )
    }

    /// Wait after the `attempts`-th failed attempt (1-based)
    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        self.multiplier
            .checked_pow(attempts - 1)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Earliest time the record may be tried again. A push service's
    /// `Retry-After` wins when it asks for a longer pause.
    pub fn retry_at(
        &self,
        now: DateTime<Utc>,
        attempts: u32,
        retry_after: Option<Duration>,
    ) -> DateTime<Utc> {
        let wait = self.delay(attempts).max(retry_after.unwrap_or_default());
        let fallback = chrono::Duration::days(1);
        let wait = chrono::Duration::from_std(wait).unwrap_or(fallback);
        now.checked_add_signed(wait).unwrap_or(now + fallback)
    }
}
