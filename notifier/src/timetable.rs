//! Read-only view of the portal's timetable.
//!
//! Class occurrences and rosters are owned by the portal. The generator only
//! reads them through [`TimetableSource`]; roster lookups are a separate call
//! so that one unreadable roster costs one occurrence, not the whole batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DataAccessError;

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `[now, now + length)`
    pub fn starting_at(now: DateTime<Utc>, length: chrono::Duration) -> Self {
        Self {
            start: now,
            end: now + length,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// A single scheduled meeting of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassOccurrence {
    pub id: String,
    pub course_code: String,
    pub title: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
}

#[async_trait]
pub trait TimetableSource: Send + Sync {
    /// Occurrences whose start time falls inside `window`
    async fn list_occurrences(
        &self,
        window: &TimeRange,
    ) -> Result<Vec<ClassOccurrence>, DataAccessError>;

    /// Students enrolled in the occurrence's course
    async fn roster(&self, occurrence: &ClassOccurrence) -> Result<Vec<String>, DataAccessError>;
}
