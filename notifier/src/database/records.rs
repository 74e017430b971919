//! Database record types (entities).
//!
//! This module contains all the record structs used by the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Reminder entities
// ============================================================================

/// Delivery state of a reminder.
///
/// ```text
/// PENDING ──► SENT      (delivered to at least one endpoint)
///    │ ▲
///    └─┘               (transient failure, attempts + 1, below budget)
/// PENDING ──► FAILED    (attempt budget exhausted, or no valid endpoint left)
/// PENDING ──► EXPIRED   (no subscription, or the class has already started)
/// ```
///
/// Terminal states are kept until cleanup removes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderState {
    Pending,
    Sent,
    Failed,
    Expired,
}

impl ReminderState {
    pub const ALL: [ReminderState; 4] = [
        ReminderState::Pending,
        ReminderState::Sent,
        ReminderState::Failed,
        ReminderState::Expired,
    ];

    pub const TERMINAL: [ReminderState; 3] = [
        ReminderState::Sent,
        ReminderState::Failed,
        ReminderState::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderState::Pending => "pending",
            ReminderState::Sent => "sent",
            ReminderState::Failed => "failed",
            ReminderState::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReminderState::Pending),
            "sent" => Some(ReminderState::Sent),
            "failed" => Some(ReminderState::Failed),
            "expired" => Some(ReminderState::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReminderState::Pending)
    }
}

impl fmt::Display for ReminderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a reminder: one per student per class occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderId {
    pub student_id: String,
    pub occurrence_id: String,
}

impl ReminderId {
    pub fn new(student_id: impl Into<String>, occurrence_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            occurrence_id: occurrence_id.into(),
        }
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.student_id, self.occurrence_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub student_id: String,
    pub occurrence_id: String,
    pub course_title: String,
    pub location: Option<String>,
    /// When the class begins
    pub scheduled_for: DateTime<Utc>,
    /// When delivery should be attempted
    pub notify_at: DateTime<Utc>,
    pub state: ReminderState,
    pub attempts: u32,
    /// Only set once the record is `FAILED`
    pub last_error: Option<String>,
    /// Earliest retry time after a transient failure
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderRecord {
    pub fn id(&self) -> ReminderId {
        ReminderId::new(self.student_id.clone(), self.occurrence_id.clone())
    }
}

/// A reminder candidate produced by the generator
#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub student_id: String,
    pub occurrence_id: String,
    pub course_title: String,
    pub location: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub notify_at: DateTime<Utc>,
}

/// Result of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Skipped,
}

/// Result of a conditional state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The update was applied; the record is now in this state
    Applied(ReminderState),
    /// Another worker already moved the record; nothing was written
    Conflict,
}

// ============================================================================
// Push subscription entities
// ============================================================================

/// Browser push endpoint owned by exactly one student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub student_id: String,
    /// Client ECDH public key (base64url, uncompressed P-256 point)
    pub p256dh: String,
    /// Client auth secret (base64url, 16 bytes)
    pub auth: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PushSubscription {
    /// Endpoint shortened for logs: origin plus the last few characters
    pub fn display_endpoint(&self) -> String {
        let origin = url::Url::parse(&self.endpoint)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "invalid-endpoint".to_string());
        let tail: String = self
            .endpoint
            .chars()
            .rev()
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}/…{}", origin, tail)
    }
}
