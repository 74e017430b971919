//! Database layer for the reminder pipeline.
//!
//! This module provides SQLite persistence for:
//! - Reminder records (the single source of truth for delivery state)
//! - Push subscriptions registered by students' browsers
//! - Read access to the portal's timetable (class occurrences and enrollments)
//!
//! The module is organized into submodules:
//! - `records` - All record types (entities)
//! - `reminders` - Reminder store operations and state transitions
//! - `subscriptions` - Push subscription registry
//! - `timetable` - SQLite-backed [`TimetableSource`](crate::timetable::TimetableSource)
//!
//! All timestamps are stored as INTEGER unix milliseconds and "now" is always
//! supplied by the caller's clock.

mod records;
mod reminders;
mod subscriptions;
mod timetable;

pub use records::*;
pub use timetable::SqliteTimetable;

use crate::errors::DataAccessError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{error, info};

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Expose pool for integration test queries and timetable seeding
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self, DataAccessError> {
        info!("Opening reminder database at {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("Failed to create parent directory {:?}: {}", parent, e);
                    return Err(DataAccessError::ConnectionFailed {
                        reason: format!("cannot create {:?}: {}", parent, e),
                    });
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = SqlitePool::connect(&database_url).await.map_err(|e| {
            error!("Failed to connect to database {}: {}", database_url, e);
            DataAccessError::ConnectionFailed {
                reason: e.to_string(),
            }
        })?;

        let database = Self { pool };
        database.initialize_tables().await?;
        info!("Reminder database ready");
        Ok(database)
    }

    /// Private in-memory database, used by tests and dry runs.
    ///
    /// A single never-recycled connection keeps the memory database alive
    /// for the lifetime of the pool.
    pub async fn in_memory() -> Result<Self, DataAccessError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DataAccessError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let database = Self { pool };
        database.initialize_tables().await?;
        Ok(database)
    }

    async fn initialize_tables(&self) -> Result<(), DataAccessError> {
        let statements: [(&'static str, &str); 7] = [
            (
                "create_reminders",
                r#"
                CREATE TABLE IF NOT EXISTS reminders (
                    student_id TEXT NOT NULL,
                    occurrence_id TEXT NOT NULL,
                    course_title TEXT NOT NULL,
                    location TEXT,
                    scheduled_for INTEGER NOT NULL,
                    notify_at INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    attempts INTEGER NOT NULL DEFAULT 0,
                    last_error TEXT,
                    next_attempt_at INTEGER,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (student_id, occurrence_id)
                )
                "#,
            ),
            (
                "create_reminders_due_index",
                "CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(state, notify_at)",
            ),
            (
                "create_reminders_updated_index",
                "CREATE INDEX IF NOT EXISTS idx_reminders_updated ON reminders(state, updated_at)",
            ),
            (
                "create_push_subscriptions",
                r#"
                CREATE TABLE IF NOT EXISTS push_subscriptions (
                    endpoint TEXT PRIMARY KEY,
                    student_id TEXT NOT NULL,
                    p256dh TEXT NOT NULL,
                    auth TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
            ),
            (
                "create_push_subscriptions_index",
                "CREATE INDEX IF NOT EXISTS idx_push_subscriptions_student ON push_subscriptions(student_id)",
            ),
            // Timetable tables belong to the portal; created here so a fresh
            // database is usable, never written by the pipeline.
            (
                "create_class_occurrences",
                r#"
                CREATE TABLE IF NOT EXISTS class_occurrences (
                    id TEXT PRIMARY KEY,
                    course_code TEXT NOT NULL,
                    title TEXT NOT NULL,
                    location TEXT,
                    starts_at INTEGER NOT NULL
                )
                "#,
            ),
            (
                "create_enrollments",
                r#"
                CREATE TABLE IF NOT EXISTS enrollments (
                    course_code TEXT NOT NULL,
                    student_id TEXT NOT NULL,
                    PRIMARY KEY (course_code, student_id)
                )
                "#,
            ),
        ];

        for (operation, sql) in statements {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!("Table initialization step '{}' failed: {}", operation, e);
                return Err(DataAccessError::QueryFailed {
                    operation,
                    source: e,
                });
            }
        }

        Ok(())
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(table: &'static str, millis: i64) -> Result<DateTime<Utc>, DataAccessError> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| DataAccessError::CorruptRow {
        table,
        reason: format!("timestamp {} out of range", millis),
    })
}
