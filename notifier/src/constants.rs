//! Central repository for default tunables and fixed protocol values
//!
//! Everything an operator may want to change is also exposed through
//! `config/notifier.toml`; these are the defaults used when a field is omitted.

/// Reminder pipeline defaults
pub mod pipeline {
    /// Minutes before class start at which the reminder is delivered
    pub const LEAD_TIME_MINUTES: i64 = 30;

    /// Forward-looking generation window
    pub const WINDOW_HOURS: i64 = 24;

    /// Delivery attempts before a reminder is marked failed
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Maximum number of due reminders fetched per dispatch tick
    pub const BATCH_LIMIT: u32 = 500;

    /// Maximum number of reminders being delivered at the same time
    pub const MAX_CONCURRENT_SENDS: usize = 16;

    /// Maximum number of class occurrences expanded at the same time
    pub const MAX_CONCURRENT_OCCURRENCES: usize = 8;

    /// Timeout for a single push request, after which it counts as transient
    pub const SEND_TIMEOUT_SECONDS: u64 = 10;

    /// Minutes past `notify_at` after which an undelivered reminder is expired
    pub const EXPIRY_GRACE_MINUTES: i64 = 30;

    /// Days terminal reminders are kept before cleanup removes them
    pub const RETENTION_DAYS: i64 = 30;

    // Upper bounds accepted from config and the command line
    pub const MAX_LEAD_TIME_MINUTES: i64 = 7 * 24 * 60;
    pub const MAX_WINDOW_HOURS: i64 = 31 * 24;
    pub const MAX_EXPIRY_GRACE_MINUTES: i64 = 7 * 24 * 60;
    pub const MAX_RETENTION_DAYS: i64 = 3650;
}

/// Retry backoff defaults
pub mod backoff {
    pub const BASE_SECONDS: u64 = 60;
    pub const MAX_SECONDS: u64 = 3600;
    pub const MULTIPLIER: u32 = 2;
}

/// Scheduler defaults (6-field cron: sec min hour day month dow)
pub mod schedule {
    /// Generate + dispatch every five minutes
    pub const DISPATCH_SCHEDULE: &str = "0 */5 * * * *";

    /// Cleanup daily at 3 AM
    pub const CLEANUP_SCHEDULE: &str = "0 0 3 * * *";
}

/// Web Push protocol values
pub mod push {
    /// Default VAPID `sub` claim
    pub const DEFAULT_SUBJECT: &str = "mailto:notifications@portal.invalid";

    /// How long the push service should hold an undelivered message
    pub const TTL_SECONDS: u32 = 3600;

    /// Lifetime of a VAPID JWT; push services reject anything above 24h
    pub const JWT_EXPIRY_HOURS: i64 = 12;

    /// Uncompressed P-256 point length
    pub const PUBLIC_KEY_LEN: usize = 65;

    /// P-256 scalar length
    pub const PRIVATE_KEY_LEN: usize = 32;

    /// Client auth secret length
    pub const AUTH_SECRET_LEN: usize = 16;

    /// aes128gcm record size advertised in the content-coding header
    pub const RECORD_SIZE: u32 = 4096;
}

/// Environment variables holding credential material
pub mod env {
    pub const VAPID_PUBLIC_KEY: &str = "VAPID_PUBLIC_KEY";
    pub const VAPID_PRIVATE_KEY: &str = "VAPID_PRIVATE_KEY";
    pub const VAPID_SUBJECT: &str = "VAPID_SUBJECT";
}

/// Default locations and bind addresses
pub mod defaults {
    pub const CONFIG_PATH: &str = "config/notifier.toml";
    pub const DATABASE_PATH: &str = "data/reminders.db";
    pub const WEB_HOST: &str = "127.0.0.1";
    pub const WEB_PORT: u16 = 8096;
}
