//! Reminder store operations.
//!
//! Every state transition is a single conditional UPDATE guarded on
//! `state = 'pending' AND attempts = <observed attempts>`. A writer working
//! from a stale snapshot gets [`Transition::Conflict`] and writes nothing, so
//! concurrent or repeated dispatch runs can never double-mark a record.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::records::{NewReminder, ReminderId, ReminderRecord, ReminderState, Transition, UpsertOutcome};
use super::{from_millis, to_millis, Database};
use crate::errors::DataAccessError;

const REMINDER_COLUMNS: &str = r#"
    student_id, occurrence_id, course_title, location, scheduled_for, notify_at,
    state, attempts, last_error, next_attempt_at, created_at, updated_at
"#;

impl Database {
    /// Insert a pending reminder unless one already exists for the same
    /// (student, occurrence) identity.
    pub async fn upsert_if_absent(
        &self,
        reminder: &NewReminder,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, DataAccessError> {
        let result = sqlx::query(
            r#"
            INSERT INTO reminders (
                student_id, occurrence_id, course_title, location, scheduled_for,
                notify_at, state, attempts, last_error, next_attempt_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, NULL, NULL, ?, ?)
            ON CONFLICT(student_id, occurrence_id) DO NOTHING
            "#,
        )
        .bind(&reminder.student_id)
        .bind(&reminder.occurrence_id)
        .bind(&reminder.course_title)
        .bind(&reminder.location)
        .bind(to_millis(reminder.scheduled_for))
        .bind(to_millis(reminder.notify_at))
        .bind(to_millis(now))
        .bind(to_millis(now))
        .execute(&self.pool)
        .await
        .map_err(DataAccessError::query("upsert_if_absent"))?;

        if result.rows_affected() == 1 {
            debug!(
                "Created reminder {}/{}",
                reminder.student_id, reminder.occurrence_id
            );
            Ok(UpsertOutcome::Created)
        } else {
            Ok(UpsertOutcome::Skipped)
        }
    }

    pub async fn get_reminder(
        &self,
        id: &ReminderId,
    ) -> Result<Option<ReminderRecord>, DataAccessError> {
        let sql = format!(
            "SELECT {} FROM reminders WHERE student_id = ? AND occurrence_id = ?",
            REMINDER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&id.student_id)
            .bind(&id.occurrence_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DataAccessError::query("get_reminder"))?;

        row.as_ref().map(reminder_from_row).transpose()
    }

    /// Pending reminders whose notify time has elapsed and whose retry delay
    /// (if any) is over, oldest first, at most `limit` of them.
    pub async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ReminderRecord>, DataAccessError> {
        let sql = format!(
            r#"
            SELECT {} FROM reminders
            WHERE state = 'pending'
              AND notify_at <= ?
              AND (next_attempt_at IS NULL OR next_attempt_at <= ?)
            ORDER BY notify_at ASC, student_id ASC
            LIMIT ?
            "#,
            REMINDER_COLUMNS
        );
        let now_ms = to_millis(now);
        let rows = sqlx::query(&sql)
            .bind(now_ms)
            .bind(now_ms)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(DataAccessError::query("fetch_due"))?;

        rows.iter().map(reminder_from_row).collect()
    }

    /// PENDING → SENT
    pub async fn mark_sent(
        &self,
        record: &ReminderRecord,
        now: DateTime<Utc>,
    ) -> Result<Transition, DataAccessError> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET state = 'sent', attempts = attempts + 1, next_attempt_at = NULL, updated_at = ?
            WHERE student_id = ? AND occurrence_id = ? AND state = 'pending' AND attempts = ?
            "#,
        )
        .bind(to_millis(now))
        .bind(&record.student_id)
        .bind(&record.occurrence_id)
        .bind(i64::from(record.attempts))
        .execute(&self.pool)
        .await
        .map_err(DataAccessError::query("mark_sent"))?;

        Ok(applied_or_conflict(result.rows_affected(), ReminderState::Sent, record))
    }

    /// Record a retry-eligible failure.
    ///
    /// Increments `attempts`; the record becomes `FAILED` once the new count
    /// reaches `max_attempts`, otherwise it stays `PENDING` and is not due
    /// again before `retry_at`.
    pub async fn mark_failed(
        &self,
        record: &ReminderRecord,
        reason: &str,
        max_attempts: u32,
        retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Transition, DataAccessError> {
        let attempts = record.attempts + 1;
        if attempts >= max_attempts {
            return self.mark_undeliverable(record, reason, now).await;
        }

        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET attempts = attempts + 1, next_attempt_at = ?, updated_at = ?
            WHERE student_id = ? AND occurrence_id = ? AND state = 'pending' AND attempts = ?
            "#,
        )
        .bind(to_millis(retry_at))
        .bind(to_millis(now))
        .bind(&record.student_id)
        .bind(&record.occurrence_id)
        .bind(i64::from(record.attempts))
        .execute(&self.pool)
        .await
        .map_err(DataAccessError::query("mark_failed"))?;

        Ok(applied_or_conflict(result.rows_affected(), ReminderState::Pending, record))
    }

    /// PENDING → FAILED regardless of the remaining attempt budget.
    /// Used when the attempt budget is spent or no valid endpoint is left.
    pub async fn mark_undeliverable(
        &self,
        record: &ReminderRecord,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, DataAccessError> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET state = 'failed', attempts = attempts + 1, last_error = ?,
                next_attempt_at = NULL, updated_at = ?
            WHERE student_id = ? AND occurrence_id = ? AND state = 'pending' AND attempts = ?
            "#,
        )
        .bind(reason)
        .bind(to_millis(now))
        .bind(&record.student_id)
        .bind(&record.occurrence_id)
        .bind(i64::from(record.attempts))
        .execute(&self.pool)
        .await
        .map_err(DataAccessError::query("mark_undeliverable"))?;

        Ok(applied_or_conflict(result.rows_affected(), ReminderState::Failed, record))
    }

    /// PENDING → EXPIRED. Attempts are left untouched since nothing was sent.
    pub async fn mark_expired(
        &self,
        record: &ReminderRecord,
        now: DateTime<Utc>,
    ) -> Result<Transition, DataAccessError> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET state = 'expired', next_attempt_at = NULL, updated_at = ?
            WHERE student_id = ? AND occurrence_id = ? AND state = 'pending' AND attempts = ?
            "#,
        )
        .bind(to_millis(now))
        .bind(&record.student_id)
        .bind(&record.occurrence_id)
        .bind(i64::from(record.attempts))
        .execute(&self.pool)
        .await
        .map_err(DataAccessError::query("mark_expired"))?;

        Ok(applied_or_conflict(result.rows_affected(), ReminderState::Expired, record))
    }

    /// Expire every pending reminder whose notify time is more than `grace`
    /// in the past. Returns the number of records expired.
    pub async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        grace: chrono::Duration,
    ) -> Result<u64, DataAccessError> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET state = 'expired', next_attempt_at = NULL, updated_at = ?
            WHERE state = 'pending' AND notify_at <= ?
            "#,
        )
        .bind(to_millis(now))
        .bind(to_millis(now - grace))
        .execute(&self.pool)
        .await
        .map_err(DataAccessError::query("expire_overdue"))?;

        Ok(result.rows_affected())
    }

    /// Delete records in the given states last updated before `cutoff`.
    /// `PENDING` is never deleted, even if asked for.
    pub async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        states: &[ReminderState],
    ) -> Result<u64, DataAccessError> {
        let mut deleted = 0;
        for state in states {
            if !state.is_terminal() {
                warn!("Refusing to delete pending reminders during cleanup");
                continue;
            }

            let result = sqlx::query("DELETE FROM reminders WHERE state = ? AND updated_at < ?")
                .bind(state.as_str())
                .bind(to_millis(cutoff))
                .execute(&self.pool)
                .await
                .map_err(DataAccessError::query("delete_older_than"))?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    /// Number of records per state; states with no records map to zero
    pub async fn count_by_state(&self) -> Result<HashMap<ReminderState, u64>, DataAccessError> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM reminders GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(DataAccessError::query("count_by_state"))?;

        let mut counts: HashMap<ReminderState, u64> =
            ReminderState::ALL.iter().map(|s| (*s, 0)).collect();

        for row in rows {
            let state: String = row
                .try_get("state")
                .map_err(DataAccessError::query("count_by_state"))?;
            let n: i64 = row
                .try_get("n")
                .map_err(DataAccessError::query("count_by_state"))?;
            let state = ReminderState::parse(&state).ok_or_else(|| DataAccessError::CorruptRow {
                table: "reminders",
                reason: format!("unknown state '{}'", state),
            })?;
            counts.insert(state, n.max(0) as u64);
        }

        Ok(counts)
    }
}

fn applied_or_conflict(rows: u64, state: ReminderState, record: &ReminderRecord) -> Transition {
    if rows == 1 {
        Transition::Applied(state)
    } else {
        debug!(
            "Reminder {} changed concurrently, skipping transition to {}",
            record.id(),
            state
        );
        Transition::Conflict
    }
}

fn reminder_from_row(row: &SqliteRow) -> Result<ReminderRecord, DataAccessError> {
    let decode = DataAccessError::query;

    let state: String = row.try_get("state").map_err(decode("decode_reminder"))?;
    let state = ReminderState::parse(&state).ok_or_else(|| DataAccessError::CorruptRow {
        table: "reminders",
        reason: format!("unknown state '{}'", state),
    })?;

    let attempts: i64 = row.try_get("attempts").map_err(decode("decode_reminder"))?;
    let attempts = u32::try_from(attempts).map_err(|_| DataAccessError::CorruptRow {
        table: "reminders",
        reason: format!("attempts {} out of range", attempts),
    })?;

    let next_attempt_at: Option<i64> = row
        .try_get("next_attempt_at")
        .map_err(decode("decode_reminder"))?;

    Ok(ReminderRecord {
        student_id: row.try_get("student_id").map_err(decode("decode_reminder"))?,
        occurrence_id: row
            .try_get("occurrence_id")
            .map_err(decode("decode_reminder"))?,
        course_title: row
            .try_get("course_title")
            .map_err(decode("decode_reminder"))?,
        location: row.try_get("location").map_err(decode("decode_reminder"))?,
        scheduled_for: from_millis(
            "reminders",
            row.try_get("scheduled_for").map_err(decode("decode_reminder"))?,
        )?,
        notify_at: from_millis(
            "reminders",
            row.try_get("notify_at").map_err(decode("decode_reminder"))?,
        )?,
        state,
        attempts,
        last_error: row.try_get("last_error").map_err(decode("decode_reminder"))?,
        next_attempt_at: next_attempt_at
            .map(|ms| from_millis("reminders", ms))
            .transpose()?,
        created_at: from_millis(
            "reminders",
            row.try_get("created_at").map_err(decode("decode_reminder"))?,
        )?,
        updated_at: from_millis(
            "reminders",
            row.try_get("updated_at").map_err(decode("decode_reminder"))?,
        )?,
    })
}
