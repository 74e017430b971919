//! Mock browser push service for transport tests
//!
//! Simulates an FCM/Mozilla-style push endpoint so tests can verify the
//! request the transport sends and how it reads the answer.

use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

pub struct MockPushService {
    pub server: MockServer,
    pub base_url: String,
}

impl MockPushService {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// Full endpoint URL for a subscription path
    pub fn endpoint(&self, subscription: &str) -> String {
        format!("{}/push/{}", self.base_url, subscription)
    }

    pub async fn mock_status(&self, subscription: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/push/{}", subscription)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_throttled(&self, subscription: &str, retry_after_seconds: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/push/{}", subscription)))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", retry_after_seconds.to_string().as_str()),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mock_slow(&self, subscription: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(format!("/push/{}", subscription)))
            .respond_with(ResponseTemplate::new(201).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    pub async fn received(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}
