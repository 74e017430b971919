//! Reminder generation from the timetable.
//!
//! For each class occurrence starting inside the window and each student on
//! its roster, a `PENDING` reminder is inserted unless one already exists for
//! the `(student, occurrence)` pair. Running it twice over the same window is
//! a no-op the second time.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::database::{Database, NewReminder, UpsertOutcome};
use crate::errors::{DataAccessError, PartialBatchError};
use crate::timetable::{ClassOccurrence, TimeRange, TimetableSource};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedBatch {
    pub occurrences: usize,
    pub created: usize,
    pub skipped: usize,
    /// Occurrences whose roster could not be read, with the reason
    pub failures: Vec<String>,
}

impl GeneratedBatch {
    pub fn partial_failure(&self) -> Option<PartialBatchError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(PartialBatchError {
            stage: "generate",
            failed: self.failures.len(),
            total: self.occurrences,
            failures: self.failures.clone(),
        })
    }
}

enum OccurrenceResult {
    Processed { created: usize, skipped: usize },
    RosterUnavailable(String),
}

pub struct ReminderGenerator {
    database: Arc<Database>,
    timetable: Arc<dyn TimetableSource>,
    clock: Arc<dyn Clock>,
    lead_time: chrono::Duration,
    max_concurrency: usize,
}

impl ReminderGenerator {
    pub fn new(
        database: Arc<Database>,
        timetable: Arc<dyn TimetableSource>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            database,
            timetable,
            clock,
            lead_time: config.lead_time(),
            max_concurrency: config.max_concurrent_occurrences.max(1),
        }
    }

    /// Create reminders for every occurrence starting inside `window`.
    ///
    /// Listing occurrences or writing to the store failing aborts the run.
    /// A single unreadable roster only skips its occurrence.
    #[instrument(skip(self), fields(start = %window.start, end = %window.end))]
    pub async fn generate(&self, window: TimeRange) -> Result<GeneratedBatch, DataAccessError> {
        let occurrences = self.timetable.list_occurrences(&window).await?;
        let mut batch = GeneratedBatch {
            occurrences: occurrences.len(),
            ..Default::default()
        };

        if occurrences.is_empty() {
            debug!("No class occurrences in window");
            return Ok(batch);
        }

        let results: Vec<_> = stream::iter(occurrences)
            .map(|occurrence| async move {
                let result = self.process_occurrence(&occurrence).await;
                (occurrence, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for (occurrence, result) in results {
            match result? {
                OccurrenceResult::Processed { created, skipped } => {
                    batch.created += created;
                    batch.skipped += skipped;
                }
                OccurrenceResult::RosterUnavailable(reason) => {
                    warn!(
                        "Skipping occurrence {} ({}): roster unavailable: {}",
                        occurrence.id, occurrence.course_code, reason
                    );
                    batch.failures.push(format!("{}: {}", occurrence.id, reason));
                }
            }
        }

        info!(
            "Generated reminders: {} created, {} already present, {} occurrence(s) skipped",
            batch.created,
            batch.skipped,
            batch.failures.len()
        );
        Ok(batch)
    }

    async fn process_occurrence(
        &self,
        occurrence: &ClassOccurrence,
    ) -> Result<OccurrenceResult, DataAccessError> {
        let students = match self.timetable.roster(occurrence).await {
            Ok(students) => students,
            Err(e) => return Ok(OccurrenceResult::RosterUnavailable(e.to_string())),
        };

        let notify_at = occurrence.starts_at - self.lead_time;
        let mut created = 0;
        let mut skipped = 0;

        for student_id in students {
            let reminder = NewReminder {
                student_id,
                occurrence_id: occurrence.id.clone(),
                course_title: occurrence.title.clone(),
                location: occurrence.location.clone(),
                scheduled_for: occurrence.starts_at,
                notify_at,
            };
            match self
                .database
                .upsert_if_absent(&reminder, self.clock.now())
                .await?
            {
                UpsertOutcome::Created => created += 1,
                UpsertOutcome::Skipped => skipped += 1,
            }
        }

        Ok(OccurrenceResult::Processed { created, skipped })
    }
}
