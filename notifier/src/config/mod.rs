// File: notifier/src/config/mod.rs
pub mod manager;
pub mod secrets;

pub use manager::ConfigManager;
pub use secrets::VapidKeys;

use crate::constants;
use crate::constants::pipeline as limits;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration loaded from `config/notifier.toml`.
///
/// Every section and field has a default, so an empty file is a valid
/// configuration. Credentials are deliberately absent: see [`VapidKeys`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub backoff: BackoffConfig,
    pub schedule: ScheduleConfig,
    pub push: PushConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: constants::defaults::DATABASE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lead_time_minutes: i64,
    pub window_hours: i64,
    pub max_attempts: u32,
    pub batch_limit: u32,
    pub max_concurrent_sends: usize,
    pub max_concurrent_occurrences: usize,
    pub send_timeout_seconds: u64,
    pub expiry_grace_minutes: i64,
    pub retention_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        use constants::pipeline::*;
        Self {
            lead_time_minutes: LEAD_TIME_MINUTES,
            window_hours: WINDOW_HOURS,
            max_attempts: MAX_ATTEMPTS,
            batch_limit: BATCH_LIMIT,
            max_concurrent_sends: MAX_CONCURRENT_SENDS,
            max_concurrent_occurrences: MAX_CONCURRENT_OCCURRENCES,
            send_timeout_seconds: SEND_TIMEOUT_SECONDS,
            expiry_grace_minutes: EXPIRY_GRACE_MINUTES,
            retention_days: RETENTION_DAYS,
        }
    }
}

impl PipelineConfig {
    pub fn lead_time(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lead_time_minutes)
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.window_hours)
    }

    pub fn expiry_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.expiry_grace_minutes)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    /// Window for a one-off run, `--hours` overriding the configured one
    pub fn window_or(&self, hours: Option<i64>) -> Result<chrono::Duration, ConfigError> {
        match hours {
            Some(hours) => {
                check_range("--hours", hours, 1, limits::MAX_WINDOW_HOURS)?;
                Ok(chrono::Duration::hours(hours))
            }
            None => Ok(self.window()),
        }
    }

    pub fn retention_or(&self, days: Option<i64>) -> Result<chrono::Duration, ConfigError> {
        match days {
            Some(days) => {
                check_range("--retention-days", days, 0, limits::MAX_RETENTION_DAYS)?;
                Ok(chrono::Duration::days(days))
            }
            None => Ok(self.retention()),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_seconds: u64,
    pub max_seconds: u64,
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_seconds: constants::backoff::BASE_SECONDS,
            max_seconds: constants::backoff::MAX_SECONDS,
            multiplier: constants::backoff::MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub dispatch_schedule: String,
    pub cleanup_schedule: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            dispatch_schedule: constants::schedule::DISPATCH_SCHEDULE.to_string(),
            cleanup_schedule: constants::schedule::CLEANUP_SCHEDULE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// VAPID `sub` claim, overridden by `VAPID_SUBJECT` when set
    pub subject: String,
    pub ttl_seconds: u32,
    pub urgency: Urgency,
    /// Page opened when the notification is clicked
    pub click_url: Option<String>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            subject: constants::push::DEFAULT_SUBJECT.to_string(),
            ttl_seconds: constants::push::TTL_SECONDS,
            urgency: Urgency::Normal,
            click_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    High,
}

impl Urgency {
    pub fn as_header(&self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: constants::defaults::WEB_HOST.to_string(),
            port: constants::defaults::WEB_PORT,
        }
    }
}

impl Config {
    /// Reject values that would make the pipeline misbehave silently
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.max_attempts == 0 {
            return Err(invalid("pipeline.max_attempts", "must be at least 1"));
        }
        if p.batch_limit == 0 {
            return Err(invalid("pipeline.batch_limit", "must be at least 1"));
        }
        if p.max_concurrent_sends == 0 || p.max_concurrent_occurrences == 0 {
            return Err(invalid(
                "pipeline.max_concurrent_*",
                "concurrency limits must be at least 1",
            ));
        }
        check_range(
            "pipeline.lead_time_minutes",
            p.lead_time_minutes,
            0,
            limits::MAX_LEAD_TIME_MINUTES,
        )?;
        check_range(
            "pipeline.expiry_grace_minutes",
            p.expiry_grace_minutes,
            0,
            limits::MAX_EXPIRY_GRACE_MINUTES,
        )?;
        check_range("pipeline.window_hours", p.window_hours, 1, limits::MAX_WINDOW_HOURS)?;
        check_range(
            "pipeline.retention_days",
            p.retention_days,
            0,
            limits::MAX_RETENTION_DAYS,
        )?;
        if p.send_timeout_seconds == 0 {
            return Err(invalid("pipeline.send_timeout_seconds", "must be positive"));
        }

        let b = &self.backoff;
        if b.base_seconds == 0 || b.multiplier == 0 {
            return Err(invalid("backoff", "base_seconds and multiplier must be positive"));
        }
        if b.base_seconds > b.max_seconds {
            return Err(invalid(
                "backoff.max_seconds",
                &format!("{} is below base_seconds {}", b.max_seconds, b.base_seconds),
            ));
        }

        crate::scheduler::validate_6_field_cron(&self.schedule.dispatch_schedule)
            .map_err(|e| invalid("schedule.dispatch_schedule", &e.to_string()))?;
        crate::scheduler::validate_6_field_cron(&self.schedule.cleanup_schedule)
            .map_err(|e| invalid("schedule.cleanup_schedule", &e.to_string()))?;

        validate_subject("push.subject", &self.push.subject)?;

        Ok(())
    }
}

/// The VAPID `sub` claim: a `mailto:` address or an `https:` URL
pub(crate) fn validate_subject(field: &str, subject: &str) -> Result<(), ConfigError> {
    let valid = match subject.strip_prefix("mailto:") {
        Some(address) => address.contains('@'),
        None => url::Url::parse(subject)
            .map(|url| url.scheme() == "https" && url.has_host())
            .unwrap_or(false),
    };
    if !valid {
        return Err(invalid(field, "must be a mailto: or https: URL"));
    }
    Ok(())
}

pub(crate) fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(invalid(
            field,
            &format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
