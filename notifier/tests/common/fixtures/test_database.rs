//! Test database utilities for in-memory SQLite testing

use chrono::{DateTime, Utc};
use notifier::database::{PushSubscription, ReminderId, ReminderRecord};
use notifier::Database;
use std::sync::Arc;

/// In-memory reminder database plus helpers for seeding the
/// portal-owned timetable tables
pub struct TestDatabase {
    database: Arc<Database>,
}

impl TestDatabase {
    pub async fn new() -> Self {
        let database = Database::in_memory()
            .await
            .expect("Failed to create in-memory database");
        Self {
            database: Arc::new(database),
        }
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    pub async fn add_occurrence(
        &self,
        id: &str,
        course_code: &str,
        title: &str,
        starts_at: DateTime<Utc>,
    ) {
        sqlx::query(
            "INSERT INTO class_occurrences (id, course_code, title, location, starts_at) VALUES (?, ?, ?, 'Room 1.12', ?)",
        )
        .bind(id)
        .bind(course_code)
        .bind(title)
        .bind(starts_at.timestamp_millis())
        .execute(self.database.pool())
        .await
        .expect("Failed to insert class occurrence");
    }

    pub async fn enroll(&self, course_code: &str, students: &[&str]) {
        for student in students {
            sqlx::query("INSERT INTO enrollments (course_code, student_id) VALUES (?, ?)")
                .bind(course_code)
                .bind(*student)
                .execute(self.database.pool())
                .await
                .expect("Failed to insert enrollment");
        }
    }

    /// Register a subscription with placeholder keys. Fine for the
    /// scripted transport, which never encrypts.
    pub async fn subscribe(&self, student: &str, endpoint: &str, now: DateTime<Utc>) {
        self.database
            .save_subscription(&PushSubscription::new(endpoint, student, "p256dh", "auth", now))
            .await
            .expect("Failed to save subscription");
    }

    pub async fn reminder(&self, student: &str, occurrence: &str) -> ReminderRecord {
        self.database
            .get_reminder(&ReminderId::new(student, occurrence))
            .await
            .expect("Failed to read reminder")
            .unwrap_or_else(|| panic!("no reminder for {}/{}", student, occurrence))
    }

    pub async fn subscription_count(&self, student: &str) -> usize {
        self.database
            .subscriptions_for(student)
            .await
            .expect("Failed to read subscriptions")
            .len()
    }

    /// Force `updated_at` for retention tests
    pub async fn backdate(&self, student: &str, occurrence: &str, updated_at: DateTime<Utc>) {
        sqlx::query("UPDATE reminders SET updated_at = ? WHERE student_id = ? AND occurrence_id = ?")
            .bind(updated_at.timestamp_millis())
            .bind(student)
            .bind(occurrence)
            .execute(self.database.pool())
            .await
            .expect("Failed to backdate reminder");
    }
}
