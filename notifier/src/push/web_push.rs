//! HTTP transport to browser push services

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::encryption::{self, EncryptionError};
use super::{vapid, PushTransport};
use crate::config::{PushConfig, Urgency, VapidKeys};
use crate::database::PushSubscription;
use crate::errors::DeliveryError;

pub struct WebPushTransport {
    client: Client,
    ttl_seconds: u32,
    urgency: Urgency,
    timeout: Duration,
}

impl WebPushTransport {
    pub fn new(config: &PushConfig, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            ttl_seconds: config.ttl_seconds,
            urgency: config.urgency,
            timeout,
        }
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        keys: &VapidKeys,
    ) -> Result<(), DeliveryError> {
        let body = encryption::encrypt(&subscription.p256dh, &subscription.auth, payload)
            .map_err(|e| match e {
                EncryptionError::InvalidClientKey { .. } => {
                    DeliveryError::permanent(None, e.to_string())
                }
                _ => DeliveryError::rejected(None, e.to_string()),
            })?;
        // JWT expiry is checked by the push service against wall time
        let authorization = vapid::authorization_header(keys, &subscription.endpoint, Utc::now())?;

        let request = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_seconds.to_string())
            .header("Urgency", self.urgency.as_header())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Authorization", authorization)
            .body(body);

        let response = match tokio::time::timeout(self.timeout, request.send()).await {
            Err(_) => {
                return Err(DeliveryError::transient(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                )))
            }
            Ok(Err(e)) => return Err(DeliveryError::transient(format!("request failed: {}", e))),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        debug!(
            "Push service answered {} for {}",
            status,
            subscription.display_endpoint()
        );
        classify(status, retry_after(response.headers()))
    }
}

/// Map a push-service status code onto the delivery outcome
pub fn classify(status: StatusCode, retry_after: Option<Duration>) -> Result<(), DeliveryError> {
    if status.is_success() {
        return Ok(());
    }

    let reason = match status.canonical_reason() {
        Some(text) => format!("{} {}", status.as_u16(), text),
        None => status.as_u16().to_string(),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(DeliveryError::Transient {
            reason,
            retry_after,
        });
    }

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(DeliveryError::permanent(Some(status.as_u16()), reason));
    }

    // 400/401/403/413 point at our VAPID token or payload, not at the subscription
    Err(DeliveryError::rejected(Some(status.as_u16()), reason))
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
