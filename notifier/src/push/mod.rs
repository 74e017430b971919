//! Push delivery
//!
//! The dispatcher only sees [`PushTransport`]. The production implementation,
//! [`WebPushTransport`], speaks the Web Push protocol: the payload is
//! encrypted for the subscription's browser keys (`aes128gcm`) and the request
//! is signed with the application server's VAPID key pair.
//!
//! ```text
//! NotificationPayload ──json──▶ encryption::encrypt ──▶ POST endpoint
//!                                                      Authorization: vapid t=<jwt>, k=<pub>
//! ```

pub mod encryption;
pub mod vapid;
pub mod web_push;

pub use web_push::WebPushTransport;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::VapidKeys;
use crate::database::{PushSubscription, ReminderRecord};
use crate::errors::DeliveryError;

/// Sends one message to one subscription endpoint.
///
/// `Ok(())` means the push service accepted the message (2xx). Failures are
/// classified into [`DeliveryError::Transient`], [`DeliveryError::Rejected`]
/// and [`DeliveryError::Permanent`]; the caller decides what happens to the
/// reminder and the subscription.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        keys: &VapidKeys,
    ) -> Result<(), DeliveryError>;
}

/// JSON body shown by the service worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Clients replace an earlier notification carrying the same tag
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrence_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NotificationPayload {
    pub fn for_reminder(record: &ReminderRecord, click_url: Option<&str>) -> Self {
        let minutes = (record.scheduled_for - record.notify_at).num_minutes().max(0);
        let body = match &record.location {
            Some(room) => format!("Starts in {} minutes in {}", minutes, room),
            None => format!("Starts in {} minutes", minutes),
        };

        Self {
            title: record.course_title.clone(),
            body,
            tag: format!("class-{}", record.occurrence_id),
            url: click_url.map(str::to_string),
            occurrence_id: Some(record.occurrence_id.clone()),
            scheduled_for: Some(record.scheduled_for),
        }
    }

    /// Ad-hoc message sent by the `test` command
    pub fn test_message(message: &str, click_url: Option<&str>) -> Self {
        Self {
            title: "Test notification".to_string(),
            body: message.to_string(),
            tag: "notifier-test".to_string(),
            url: click_url.map(str::to_string),
            occurrence_id: None,
            scheduled_for: None,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ReminderState;
    use chrono::{Duration, TimeZone};

    fn record(location: Option<&str>) -> ReminderRecord {
        let starts = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        ReminderRecord {
            student_id: "s-1".to_string(),
            occurrence_id: "occ-42".to_string(),
            course_title: "Linear Algebra".to_string(),
            location: location.map(str::to_string),
            scheduled_for: starts,
            notify_at: starts - Duration::minutes(30),
            state: ReminderState::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            created_at: starts - Duration::hours(5),
            updated_at: starts - Duration::hours(5),
        }
    }

    #[test]
    fn reminder_payload_uses_occurrence_tag_and_camel_case() {
        let payload = NotificationPayload::for_reminder(&record(Some("B-204")), Some("/timetable"));
        assert_eq!(payload.tag, "class-occ-42");
        assert_eq!(payload.body, "Starts in 30 minutes in B-204");

        let json: serde_json::Value = serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap();
        assert_eq!(json["occurrenceId"], "occ-42");
        assert_eq!(json["url"], "/timetable");
        assert!(json["scheduledFor"].is_string());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let payload = NotificationPayload::test_message("hello", None);
        let json: serde_json::Value = serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap();
        assert!(json.get("url").is_none());
        assert!(json.get("occurrenceId").is_none());
        assert_eq!(json["body"], "hello");
    }
}
