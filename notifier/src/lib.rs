pub mod clock;
pub mod config;
pub mod constants;
pub mod database;
pub mod errors;
pub mod push;
pub mod scheduler;
pub mod services;
pub mod timetable;
pub mod web;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigManager, VapidKeys};
pub use database::{Database, SqliteTimetable};
pub use errors::{ConfigError, DataAccessError, DeliveryError, NotifierError, PartialBatchError};
pub use push::{PushTransport, WebPushTransport};
pub use scheduler::{PipelineTicks, ReminderScheduler, TickOutcome};
pub use services::{CleanupService, Dispatcher, ReminderGenerator, StatsService};
pub use timetable::{ClassOccurrence, TimeRange, TimetableSource};
