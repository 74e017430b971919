//! Retention sweep over terminal reminders

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::database::{Database, ReminderState};
use crate::errors::DataAccessError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: u64,
    pub cutoff: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CleanupService {
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl CleanupService {
    pub fn new(database: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { database, clock }
    }

    /// Delete `SENT`, `FAILED` and `EXPIRED` records last updated more than
    /// `retention` ago. Pending reminders are kept whatever their age.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, retention: chrono::Duration) -> Result<CleanupReport, DataAccessError> {
        let cutoff = self.clock.now() - retention;
        let deleted = self
            .database
            .delete_older_than(cutoff, &ReminderState::TERMINAL)
            .await?;

        info!("Cleanup removed {} reminder(s) last updated before {}", deleted, cutoff);
        Ok(CleanupReport { deleted, cutoff })
    }
}
