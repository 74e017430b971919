//! Retention cleanup against the store

mod common;

use chrono::Duration;
use common::fixtures::*;
use notifier::database::{NewReminder, ReminderId, ReminderState};
use notifier::{CleanupService, Database, ManualClock};
use std::sync::Arc;

async fn seed(db: &Database, student: &str, occurrence: &str) {
    let reminder = NewReminder {
        student_id: student.to_string(),
        occurrence_id: occurrence.to_string(),
        course_title: "Calculus".to_string(),
        location: None,
        scheduled_for: t0() + Duration::minutes(30),
        notify_at: t0(),
    };
    db.upsert_if_absent(&reminder, t0()).await.unwrap();
}

async fn settle(db: &Database, student: &str, occurrence: &str, state: ReminderState) {
    let record = db
        .get_reminder(&ReminderId::new(student, occurrence))
        .await
        .unwrap()
        .unwrap();
    match state {
        ReminderState::Sent => db.mark_sent(&record, t0()).await.unwrap(),
        ReminderState::Failed => db.mark_undeliverable(&record, "gone", t0()).await.unwrap(),
        ReminderState::Expired => db.mark_expired(&record, t0()).await.unwrap(),
        ReminderState::Pending => return,
    };
}

#[tokio::test]
async fn test_pending_records_survive_any_age() {
    let test_db = TestDatabase::new().await;
    let db = test_db.database();
    seed(&db, students::ALICE, "occ-old").await;
    test_db
        .backdate(students::ALICE, "occ-old", t0() - Duration::days(400))
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let report = CleanupService::new(db.clone(), clock)
        .cleanup(Duration::days(30))
        .await
        .unwrap();

    assert_eq!(report.deleted, 0);
    assert_eq!(
        test_db.reminder(students::ALICE, "occ-old").await.state,
        ReminderState::Pending
    );
}

#[tokio::test]
async fn test_terminal_records_removed_past_retention() {
    let test_db = TestDatabase::new().await;
    let db = test_db.database();
    for (occurrence, state) in [
        ("occ-sent", ReminderState::Sent),
        ("occ-failed", ReminderState::Failed),
        ("occ-expired", ReminderState::Expired),
    ] {
        seed(&db, students::BOB, occurrence).await;
        settle(&db, students::BOB, occurrence, state).await;
    }

    let clock = Arc::new(ManualClock::new(t0() + Duration::days(31)));
    let report = CleanupService::new(db.clone(), clock)
        .cleanup(Duration::days(30))
        .await
        .unwrap();

    assert_eq!(report.deleted, 3);
    assert_eq!(report.cutoff, t0() + Duration::days(1));
    assert!(db.count_by_state().await.unwrap().values().all(|n| *n == 0));
}

#[tokio::test]
async fn test_retention_boundary_is_exclusive() {
    let test_db = TestDatabase::new().await;
    let db = test_db.database();
    for occurrence in ["occ-at-cutoff", "occ-before-cutoff", "occ-recent"] {
        seed(&db, students::CAROL, occurrence).await;
        settle(&db, students::CAROL, occurrence, ReminderState::Sent).await;
    }

    let now = t0() + Duration::days(60);
    let cutoff = now - Duration::days(30);
    test_db.backdate(students::CAROL, "occ-at-cutoff", cutoff).await;
    test_db
        .backdate(students::CAROL, "occ-before-cutoff", cutoff - Duration::milliseconds(1))
        .await;
    test_db
        .backdate(students::CAROL, "occ-recent", now - Duration::days(1))
        .await;

    let report = CleanupService::new(db.clone(), Arc::new(ManualClock::new(now)))
        .cleanup(Duration::days(30))
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert!(db
        .get_reminder(&ReminderId::new(students::CAROL, "occ-before-cutoff"))
        .await
        .unwrap()
        .is_none());
    assert!(db
        .get_reminder(&ReminderId::new(students::CAROL, "occ-at-cutoff"))
        .await
        .unwrap()
        .is_some());
    assert!(db
        .get_reminder(&ReminderId::new(students::CAROL, "occ-recent"))
        .await
        .unwrap()
        .is_some());
}
