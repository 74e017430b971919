//! Error types for the reminder pipeline
//!
//! Every failure in the pipeline falls into one of these families:
//!
//! - [`ConfigError`]: bad or missing configuration/credentials, fatal at startup
//! - [`DeliveryError::Transient`]: push delivery may succeed later, retry eligible
//! - [`DeliveryError::Rejected`]: the push service refused our request; the
//!   subscription is kept and the attempt still counts
//! - [`DeliveryError::Permanent`]: the endpoint is invalid and must be removed
//! - [`DataAccessError`]: the store is unreachable or returned corrupt rows,
//!   fatal for the current tick
//! - [`PartialBatchError`]: some records in a batch failed, reported but not fatal

use std::time::Duration;

/// Main error type for the notifier
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Data access error: {0}")]
    DataAccess(#[from] DataAccessError),

    #[error("Batch completed with failures: {0}")]
    PartialBatch(#[from] PartialBatchError),
}

/// Configuration and credential errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required setting: {field}")]
    MissingRequired { field: String },

    #[error("Failed to parse config: {reason}")]
    ParseError { reason: String },
}

/// Outcome of a failed push attempt against a single endpoint
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    /// Retry may succeed later (5xx, 429, timeout, connection failure)
    #[error("transient failure: {reason}")]
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },

    /// Our side of the request was refused (VAPID token, payload size,
    /// other 4xx). Says nothing about the subscription itself.
    #[error("rejected by push service: {reason}")]
    Rejected { status: Option<u16>, reason: String },

    /// The endpoint is gone (404, 410) or its browser keys are unusable
    #[error("permanent failure: {reason}")]
    Permanent { status: Option<u16>, reason: String },
}

impl DeliveryError {
    pub fn transient(reason: impl Into<String>) -> Self {
        DeliveryError::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn rejected(status: Option<u16>, reason: impl Into<String>) -> Self {
        DeliveryError::Rejected {
            status,
            reason: reason.into(),
        }
    }

    pub fn permanent(status: Option<u16>, reason: impl Into<String>) -> Self {
        DeliveryError::Permanent {
            status,
            reason: reason.into(),
        }
    }

    /// Only a permanent failure justifies deleting the subscription
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Permanent { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DeliveryError::Transient { retry_after, .. } => *retry_after,
            DeliveryError::Rejected { .. } | DeliveryError::Permanent { .. } => None,
        }
    }
}

/// Store access errors
#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    #[error("Database connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Query '{operation}' failed: {source}")]
    QueryFailed {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Corrupt row in '{table}': {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error("Timetable lookup failed: {reason}")]
    Timetable { reason: String },
}

impl DataAccessError {
    pub fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| DataAccessError::QueryFailed { operation, source }
    }
}

/// One or more records failed within an otherwise successful batch
#[derive(Debug, thiserror::Error)]
#[error("{failed} of {total} records failed in {stage}")]
pub struct PartialBatchError {
    pub stage: &'static str,
    pub failed: usize,
    pub total: usize,
    pub failures: Vec<String>,
}
