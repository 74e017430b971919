use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::database::{Database, ReminderState};
use crate::errors::DataAccessError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderStats {
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
    pub expired: u64,
    pub total: u64,
}

/// Read-only aggregation; safe to call at any time
#[derive(Clone)]
pub struct StatsService {
    database: Arc<Database>,
}

impl StatsService {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    pub async fn stats(&self) -> Result<ReminderStats, DataAccessError> {
        let counts = self.database.count_by_state().await?;
        let count = |state| counts.get(&state).copied().unwrap_or(0);

        let stats = ReminderStats {
            pending: count(ReminderState::Pending),
            sent: count(ReminderState::Sent),
            failed: count(ReminderState::Failed),
            expired: count(ReminderState::Expired),
            total: counts.values().sum(),
        };
        Ok(stats)
    }
}
