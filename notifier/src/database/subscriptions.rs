//! Push subscription registry.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info};

use super::records::PushSubscription;
use super::{from_millis, to_millis, Database};
use crate::errors::DataAccessError;

impl Database {
    /// Register an endpoint. Re-registering an existing endpoint refreshes
    /// its keys and moves it to the given student.
    pub async fn save_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<(), DataAccessError> {
        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (endpoint, student_id, p256dh, auth, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(endpoint) DO UPDATE SET
                student_id = excluded.student_id,
                p256dh = excluded.p256dh,
                auth = excluded.auth,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&subscription.endpoint)
        .bind(&subscription.student_id)
        .bind(&subscription.p256dh)
        .bind(&subscription.auth)
        .bind(to_millis(subscription.created_at))
        .bind(to_millis(subscription.updated_at))
        .execute(&self.pool)
        .await
        .map_err(DataAccessError::query("save_subscription"))?;

        info!(
            "Saved push subscription {} for student {}",
            subscription.display_endpoint(),
            subscription.student_id
        );
        Ok(())
    }

    /// Returns whether a subscription was actually removed
    pub async fn remove_subscription(&self, endpoint: &str) -> Result<bool, DataAccessError> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .map_err(DataAccessError::query("remove_subscription"))?;

        debug!("Removed {} push subscription(s)", result.rows_affected());
        Ok(result.rows_affected() > 0)
    }

    pub async fn subscriptions_for(
        &self,
        student_id: &str,
    ) -> Result<Vec<PushSubscription>, DataAccessError> {
        let rows = sqlx::query(
            r#"
            SELECT endpoint, student_id, p256dh, auth, created_at, updated_at
            FROM push_subscriptions
            WHERE student_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DataAccessError::query("subscriptions_for"))?;

        rows.iter().map(subscription_from_row).collect()
    }

    pub async fn count_subscriptions(&self) -> Result<u64, DataAccessError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM push_subscriptions")
            .fetch_one(&self.pool)
            .await
            .map_err(DataAccessError::query("count_subscriptions"))?;
        Ok(n.max(0) as u64)
    }
}

impl PushSubscription {
    pub fn new(
        endpoint: impl Into<String>,
        student_id: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            student_id: student_id.into(),
            p256dh: p256dh.into(),
            auth: auth.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn subscription_from_row(row: &SqliteRow) -> Result<PushSubscription, DataAccessError> {
    let decode = DataAccessError::query;
    Ok(PushSubscription {
        endpoint: row.try_get("endpoint").map_err(decode("decode_subscription"))?,
        student_id: row
            .try_get("student_id")
            .map_err(decode("decode_subscription"))?,
        p256dh: row.try_get("p256dh").map_err(decode("decode_subscription"))?,
        auth: row.try_get("auth").map_err(decode("decode_subscription"))?,
        created_at: from_millis(
            "push_subscriptions",
            row.try_get("created_at")
                .map_err(decode("decode_subscription"))?,
        )?,
        updated_at: from_millis(
            "push_subscriptions",
            row.try_get("updated_at")
                .map_err(decode("decode_subscription"))?,
        )?,
    })
}
