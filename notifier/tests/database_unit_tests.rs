//! Unit tests for reminder store operations
//!
//! These tests verify the store's transition rules using in-memory SQLite
//! for speed and isolation.

mod common;

use chrono::{Duration, Utc};
use common::fixtures::*;
use notifier::database::{NewReminder, ReminderId, ReminderState, Transition, UpsertOutcome};
use notifier::Database;
use sqlx::Row;

fn candidate(student: &str, occurrence: &str, notify_in: Duration) -> NewReminder {
    NewReminder {
        student_id: student.to_string(),
        occurrence_id: occurrence.to_string(),
        course_title: "Calculus".to_string(),
        location: Some("Room 1.12".to_string()),
        scheduled_for: t0() + notify_in + Duration::minutes(30),
        notify_at: t0() + notify_in,
    }
}

async fn seeded(students: &[&str]) -> Database {
    let db = Database::in_memory().await.unwrap();
    for student in students {
        db.upsert_if_absent(&candidate(student, "occ-1", Duration::zero()), t0())
            .await
            .unwrap();
    }
    db
}

async fn load(db: &Database, student: &str, occurrence: &str) -> notifier::database::ReminderRecord {
    db.get_reminder(&ReminderId::new(student, occurrence))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_database_initialization() {
    let db = TestDatabase::new().await;
    let database = db.database();

    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type='table'")
        .fetch_all(database.pool())
        .await
        .expect("Failed to query tables");

    let table_names: Vec<String> = rows
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    for table in ["reminders", "push_subscriptions", "class_occurrences", "enrollments"] {
        assert!(table_names.contains(&table.to_string()), "missing {}", table);
    }
}

#[tokio::test]
async fn test_database_file_is_created_with_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("reminders.db");

    let db = Database::new(path.to_str().unwrap()).await.unwrap();
    db.upsert_if_absent(&candidate(students::ALICE, "occ-1", Duration::zero()), t0())
        .await
        .unwrap();
    drop(db);

    // Reopening keeps existing records
    let reopened = Database::new(path.to_str().unwrap()).await.unwrap();
    assert_eq!(
        reopened
            .upsert_if_absent(&candidate(students::ALICE, "occ-1", Duration::zero()), t0())
            .await
            .unwrap(),
        UpsertOutcome::Skipped
    );
}

#[tokio::test]
async fn test_attempts_only_grow() {
    let db = seeded(&[students::ALICE]).await;
    let mut observed = Vec::new();

    for i in 0..2 {
        let record = load(&db, students::ALICE, "occ-1").await;
        observed.push(record.attempts);
        let now = t0() + Duration::minutes(i);
        db.mark_failed(&record, "503", 3, now, now).await.unwrap();
    }
    let record = load(&db, students::ALICE, "occ-1").await;
    observed.push(record.attempts);
    db.mark_sent(&record, t0() + Duration::minutes(5)).await.unwrap();
    observed.push(load(&db, students::ALICE, "occ-1").await.attempts);

    assert_eq!(observed, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_terminal_records_accept_no_further_transitions() {
    let db = seeded(&[students::ALICE, students::BOB, students::CAROL]).await;

    let alice = load(&db, students::ALICE, "occ-1").await;
    db.mark_sent(&alice, t0()).await.unwrap();
    let bob = load(&db, students::BOB, "occ-1").await;
    db.mark_undeliverable(&bob, "NoValidEndpoint", t0()).await.unwrap();
    let carol = load(&db, students::CAROL, "occ-1").await;
    db.mark_expired(&carol, t0()).await.unwrap();

    for student in [students::ALICE, students::BOB, students::CAROL] {
        let current = load(&db, student, "occ-1").await;
        let later = t0() + Duration::minutes(1);
        assert_eq!(db.mark_sent(&current, later).await.unwrap(), Transition::Conflict);
        assert_eq!(
            db.mark_failed(&current, "503", 3, later, later).await.unwrap(),
            Transition::Conflict
        );
        assert_eq!(db.mark_expired(&current, later).await.unwrap(), Transition::Conflict);
        assert_eq!(load(&db, student, "occ-1").await, current);
    }
}

#[tokio::test]
async fn test_concurrent_writers_with_same_snapshot_apply_once() {
    let db = std::sync::Arc::new(seeded(&[students::ALICE]).await);
    let snapshot = load(&db, students::ALICE, "occ-1").await;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = db.clone();
            let snapshot = snapshot.clone();
            tokio::spawn(async move { db.mark_sent(&snapshot, t0()).await.unwrap() })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap() == Transition::Applied(ReminderState::Sent) {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(load(&db, students::ALICE, "occ-1").await.attempts, 1);
}

#[tokio::test]
async fn test_last_attempt_fails_the_record() {
    let db = seeded(&[students::BOB]).await;
    let mut record = load(&db, students::BOB, "occ-1").await;

    for expected in [ReminderState::Pending, ReminderState::Pending, ReminderState::Failed] {
        let transition = db
            .mark_failed(&record, "503 Service Unavailable", 3, t0(), t0())
            .await
            .unwrap();
        assert_eq!(transition, Transition::Applied(expected));
        record = load(&db, students::BOB, "occ-1").await;
    }

    assert_eq!(record.state, ReminderState::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.last_error.as_deref(), Some("503 Service Unavailable"));
}

#[tokio::test]
async fn test_fetch_due_respects_time_order_and_limit() {
    let db = Database::in_memory().await.unwrap();
    for (student, minutes) in [
        (students::CAROL, 10),
        (students::ALICE, 0),
        (students::BOB, 5),
    ] {
        db.upsert_if_absent(&candidate(student, "occ-1", Duration::minutes(minutes)), t0())
            .await
            .unwrap();
    }
    db.upsert_if_absent(&candidate(students::ALICE, "occ-later", Duration::hours(3)), t0())
        .await
        .unwrap();

    let now = t0() + Duration::minutes(10);
    let due: Vec<_> = db
        .fetch_due(now, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.student_id)
        .collect();
    assert_eq!(due, vec![students::ALICE, students::BOB, students::CAROL]);

    let limited = db.fetch_due(now, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[1].student_id, students::BOB);
}

#[tokio::test]
async fn test_expire_overdue_only_touches_pending_past_grace() {
    let db = Database::in_memory().await.unwrap();
    db.upsert_if_absent(&candidate(students::ALICE, "occ-old", Duration::zero()), t0())
        .await
        .unwrap();
    db.upsert_if_absent(&candidate(students::BOB, "occ-old", Duration::zero()), t0())
        .await
        .unwrap();
    db.upsert_if_absent(&candidate(students::ALICE, "occ-new", Duration::minutes(50)), t0())
        .await
        .unwrap();
    let bob = load(&db, students::BOB, "occ-old").await;
    db.mark_sent(&bob, t0()).await.unwrap();

    let expired = db
        .expire_overdue(t0() + Duration::hours(1), Duration::minutes(30))
        .await
        .unwrap();

    assert_eq!(expired, 1);
    assert_eq!(load(&db, students::ALICE, "occ-old").await.state, ReminderState::Expired);
    assert_eq!(load(&db, students::BOB, "occ-old").await.state, ReminderState::Sent);
    assert_eq!(load(&db, students::ALICE, "occ-new").await.state, ReminderState::Pending);
}

#[tokio::test]
async fn test_count_by_state_includes_empty_states() {
    let db = Database::in_memory().await.unwrap();

    let counts = db.count_by_state().await.unwrap();

    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|n| *n == 0));
}

#[tokio::test]
async fn test_unknown_state_is_reported_as_corrupt() {
    let db = seeded(&[students::ALICE]).await;
    sqlx::query("UPDATE reminders SET state = 'delivered'")
        .execute(db.pool())
        .await
        .unwrap();

    let err = db
        .get_reminder(&ReminderId::new(students::ALICE, "occ-1"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("delivered"));
}

#[tokio::test]
async fn test_timestamps_round_trip_at_millisecond_precision() {
    let db = Database::in_memory().await.unwrap();
    let now = Utc::now();
    let mut reminder = candidate(students::ALICE, "occ-1", Duration::zero());
    reminder.notify_at = now;

    db.upsert_if_absent(&reminder, now).await.unwrap();
    let stored = load(&db, students::ALICE, "occ-1").await;

    assert_eq!(stored.notify_at.timestamp_millis(), now.timestamp_millis());
    assert_eq!(stored.created_at.timestamp_millis(), now.timestamp_millis());
}
