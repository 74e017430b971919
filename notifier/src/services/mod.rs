pub mod backoff;
pub mod cleanup_service;
pub mod dispatcher;
pub mod generator;
pub mod stats_service;

pub use backoff::BackoffPolicy;
pub use cleanup_service::{CleanupReport, CleanupService};
pub use dispatcher::{DispatchOutcome, DispatchReport, Dispatcher, TestDelivery, NO_VALID_ENDPOINT};
pub use generator::{GeneratedBatch, ReminderGenerator};
pub use stats_service::{ReminderStats, StatsService};
