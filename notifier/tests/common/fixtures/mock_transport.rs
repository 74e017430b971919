//! Scripted push transport for dispatcher and scheduler tests
//!
//! Each endpoint answers with a configured result (success by default) and
//! every call is recorded. A transport built with [`ScriptedTransport::gated`]
//! holds every send until [`ScriptedTransport::release`] is called, which is
//! how tests keep a tick "in flight".

use async_trait::async_trait;
use notifier::config::VapidKeys;
use notifier::database::PushSubscription;
use notifier::errors::DeliveryError;
use notifier::push::web_push::classify;
use notifier::PushTransport;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub endpoint: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, Result<(), DeliveryError>>>,
    sent: Mutex<Vec<SentMessage>>,
    gate: Option<Semaphore>,
    started: Notify,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send waits for [`release`](Self::release)
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn respond(&self, endpoint: &str, result: Result<(), DeliveryError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), result);
    }

    /// Answer like the real transport does for this HTTP status
    pub fn respond_status(&self, endpoint: &str, status: u16) {
        let status = StatusCode::from_u16(status).expect("Invalid status code");
        self.respond(endpoint, classify(status, None));
    }

    pub fn release(&self, sends: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(sends);
        }
    }

    /// Resolves once a send is waiting at the gate
    pub async fn wait_until_sending(&self) {
        self.started.notified().await;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, endpoint: &str) -> usize {
        self.sent()
            .iter()
            .filter(|m| m.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        _keys: &VapidKeys,
    ) -> Result<(), DeliveryError> {
        if let Some(gate) = &self.gate {
            self.started.notify_one();
            gate.acquire().await.expect("gate closed").forget();
        }

        self.sent.lock().unwrap().push(SentMessage {
            endpoint: subscription.endpoint.clone(),
            payload: serde_json::from_slice(payload).unwrap_or(serde_json::Value::Null),
        });

        self.responses
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .cloned()
            .unwrap_or(Ok(()))
    }
}
