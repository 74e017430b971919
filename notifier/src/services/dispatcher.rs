//! Push delivery of due reminders.
//!
//! Every due record is fanned out to all of its student's subscriptions and
//! counts as sent when at least one endpoint accepts it. Failures are split:
//!
//! - permanent (404/410, invalid keys): the subscription is deleted; when no
//!   endpoint is left the record fails with `NoValidEndpoint`
//! - transient (429, 5xx, timeout) or rejected (other 4xx, our VAPID token or
//!   payload refused): the subscription is kept and the record stays
//!   `PENDING` with a backoff until the attempt budget is spent, then fails
//!
//! Records are processed concurrently up to `max_concurrent_sends`. A
//! cancelled run leaves untouched records `PENDING` with their attempt count
//! unchanged.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::backoff::BackoffPolicy;
use crate::clock::Clock;
use crate::config::{Config, VapidKeys};
use crate::database::{Database, ReminderRecord, ReminderState, Transition};
use crate::errors::{DataAccessError, DeliveryError, PartialBatchError};
use crate::push::{NotificationPayload, PushTransport};

/// Failure reason recorded when every endpoint of a student is gone
pub const NO_VALID_ENDPOINT: &str = "NoValidEndpoint";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// Transient or rejected failure, still `PENDING` for a later tick
    Retrying { reason: String },
    Failed { reason: String },
    /// Student has no subscription; record expired
    NoSubscription,
    /// Another worker changed the record first
    Conflict,
    /// Shutdown requested before the record was attempted
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Pending records swept to `EXPIRED` before the batch
    pub expired: u64,
    pub total: usize,
    pub sent: usize,
    pub retrying: usize,
    pub failed: usize,
    pub no_subscription: usize,
    pub conflicts: usize,
    pub cancelled: usize,
    pub failures: Vec<String>,
}

impl DispatchReport {
    fn record(&mut self, record: &ReminderRecord, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::Retrying { reason } => {
                self.retrying += 1;
                self.failures.push(format!("{}: {}", record.id(), reason));
            }
            DispatchOutcome::Failed { reason } => {
                self.failed += 1;
                self.failures.push(format!("{}: {}", record.id(), reason));
            }
            DispatchOutcome::NoSubscription => self.no_subscription += 1,
            DispatchOutcome::Conflict => self.conflicts += 1,
            DispatchOutcome::Cancelled => self.cancelled += 1,
        }
    }

    pub fn partial_failure(&self) -> Option<PartialBatchError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(PartialBatchError {
            stage: "dispatch",
            failed: self.failures.len(),
            total: self.total,
            failures: self.failures.clone(),
        })
    }
}

/// Result of an ad-hoc test message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestDelivery {
    pub attempted: usize,
    pub delivered: usize,
    pub removed: usize,
    pub errors: Vec<String>,
}

pub struct Dispatcher {
    database: Arc<Database>,
    transport: Arc<dyn PushTransport>,
    keys: Arc<VapidKeys>,
    clock: Arc<dyn Clock>,
    backoff: BackoffPolicy,
    max_attempts: u32,
    batch_limit: u32,
    max_concurrency: usize,
    expiry_grace: chrono::Duration,
    click_url: Option<String>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        database: Arc<Database>,
        transport: Arc<dyn PushTransport>,
        keys: Arc<VapidKeys>,
        clock: Arc<dyn Clock>,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            database,
            transport,
            keys,
            clock,
            backoff: BackoffPolicy::from_config(&config.backoff),
            max_attempts: config.pipeline.max_attempts,
            batch_limit: config.pipeline.batch_limit,
            max_concurrency: config.pipeline.max_concurrent_sends.max(1),
            expiry_grace: config.pipeline.expiry_grace(),
            click_url: config.push.click_url.clone(),
            cancel,
        }
    }

    /// Expire overdue reminders, then dispatch everything due now
    #[instrument(skip(self))]
    pub async fn run_due(&self) -> Result<DispatchReport, DataAccessError> {
        let now = self.clock.now();
        let expired = self.database.expire_overdue(now, self.expiry_grace).await?;
        if expired > 0 {
            info!("Expired {} overdue reminder(s)", expired);
        }

        let due = self.database.fetch_due(now, self.batch_limit).await?;
        let mut report = self.dispatch_batch(due).await?;
        report.expired = expired;
        Ok(report)
    }

    /// Attempt delivery of each record
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn dispatch_batch(
        &self,
        records: Vec<ReminderRecord>,
    ) -> Result<DispatchReport, DataAccessError> {
        let mut report = DispatchReport {
            total: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            debug!("No reminders due");
            return Ok(report);
        }

        let results: Vec<_> = stream::iter(records)
            .map(|record| async move {
                let result = self.dispatch_one(&record).await;
                (record, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut store_error = None;
        for (record, result) in results {
            match result {
                Ok(outcome) => report.record(&record, outcome),
                Err(e) => {
                    warn!("Store error while dispatching {}: {}", record.id(), e);
                    store_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = store_error {
            return Err(e);
        }

        info!(
            "Dispatched {} reminder(s): {} sent, {} retrying, {} failed, {} without subscription, {} conflicts, {} cancelled",
            report.total,
            report.sent,
            report.retrying,
            report.failed,
            report.no_subscription,
            report.conflicts,
            report.cancelled
        );
        Ok(report)
    }

    async fn dispatch_one(&self, record: &ReminderRecord) -> Result<DispatchOutcome, DataAccessError> {
        if self.cancel.is_cancelled() {
            return Ok(DispatchOutcome::Cancelled);
        }

        let subscriptions = self.database.subscriptions_for(&record.student_id).await?;
        if subscriptions.is_empty() {
            debug!("No push subscription for {}, expiring", record.id());
            let transition = self.database.mark_expired(record, self.clock.now()).await?;
            return Ok(match transition {
                Transition::Applied(_) => DispatchOutcome::NoSubscription,
                Transition::Conflict => DispatchOutcome::Conflict,
            });
        }

        let payload =
            match NotificationPayload::for_reminder(record, self.click_url.as_deref()).to_bytes() {
                Ok(payload) => payload,
                Err(e) => {
                    let reason = format!("cannot encode payload: {}", e);
                    warn!("{} for {}", reason, record.id());
                    return self.record_retry(record, DeliveryError::rejected(None, reason)).await;
                }
            };
        let mut delivered = 0;
        let mut retryable: Option<DeliveryError> = None;

        for subscription in &subscriptions {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if delivered == 0 => {
                    debug!("Cancelled before delivering {}", record.id());
                    return Ok(DispatchOutcome::Cancelled);
                }
                result = self.transport.send(subscription, &payload, &self.keys) => result,
            };

            match result {
                Ok(()) => delivered += 1,
                Err(e) if e.is_permanent() => {
                    warn!(
                        "Removing subscription {} of student {}: {}",
                        subscription.display_endpoint(),
                        subscription.student_id,
                        e
                    );
                    self.database.remove_subscription(&subscription.endpoint).await?;
                }
                Err(e) => {
                    warn!(
                        "Delivery of {} to {} failed: {}",
                        record.id(),
                        subscription.display_endpoint(),
                        e
                    );
                    retryable = Some(longest_wait(retryable, e));
                }
            }
        }

        let now = self.clock.now();
        if delivered > 0 {
            let transition = self.database.mark_sent(record, now).await?;
            return Ok(outcome_of(record, transition, String::new()));
        }
        if let Some(error) = retryable {
            return self.record_retry(record, error).await;
        }

        let transition = self
            .database
            .mark_undeliverable(record, NO_VALID_ENDPOINT, now)
            .await?;
        Ok(outcome_of(record, transition, NO_VALID_ENDPOINT.to_string()))
    }

    /// Spend one attempt: back off, or fail once the budget is used up
    async fn record_retry(
        &self,
        record: &ReminderRecord,
        error: DeliveryError,
    ) -> Result<DispatchOutcome, DataAccessError> {
        let now = self.clock.now();
        let reason = error.to_string();
        let retry_at = self
            .backoff
            .retry_at(now, record.attempts + 1, error.retry_after());
        let transition = self
            .database
            .mark_failed(record, &reason, self.max_attempts, retry_at, now)
            .await?;
        Ok(outcome_of(record, transition, reason))
    }

    /// Send an ad-hoc message to every subscription of a student.
    /// Permanently failing endpoints are removed, reminders are not touched.
    pub async fn send_test(
        &self,
        student_id: &str,
        message: &str,
    ) -> Result<TestDelivery, DataAccessError> {
        let subscriptions = self.database.subscriptions_for(student_id).await?;
        let mut delivery = TestDelivery {
            attempted: subscriptions.len(),
            ..Default::default()
        };
        let payload =
            match NotificationPayload::test_message(message, self.click_url.as_deref()).to_bytes() {
                Ok(payload) => payload,
                Err(e) => {
                    delivery.errors.push(format!("cannot encode payload: {}", e));
                    return Ok(delivery);
                }
            };

        for subscription in &subscriptions {
            match self.transport.send(subscription, &payload, &self.keys).await {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    if e.is_permanent() && self.database.remove_subscription(&subscription.endpoint).await? {
                        delivery.removed += 1;
                    }
                    delivery
                        .errors
                        .push(format!("{}: {}", subscription.display_endpoint(), e));
                }
            }
        }

        info!(
            "Test message to {}: {}/{} endpoint(s) accepted",
            student_id, delivery.delivered, delivery.attempted
        );
        Ok(delivery)
    }
}

fn outcome_of(record: &ReminderRecord, transition: Transition, reason: String) -> DispatchOutcome {
    match transition {
        Transition::Applied(ReminderState::Sent) => DispatchOutcome::Sent,
        Transition::Applied(ReminderState::Pending) => DispatchOutcome::Retrying { reason },
        Transition::Applied(_) => DispatchOutcome::Failed { reason },
        Transition::Conflict => {
            debug!("{} changed concurrently, leaving it alone", record.id());
            DispatchOutcome::Conflict
        }
    }
}

/// Keep the retryable error asking for the longest pause
fn longest_wait(current: Option<DeliveryError>, next: DeliveryError) -> DeliveryError {
    match current {
        Some(current) if current.retry_after().unwrap_or(Duration::ZERO)
            >= next.retry_after().unwrap_or(Duration::ZERO) =>
        {
            current
        }
        _ => next,
    }
}
