//! In-memory timetable for generator tests

use async_trait::async_trait;
use notifier::errors::DataAccessError;
use notifier::{ClassOccurrence, TimeRange, TimetableSource};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct StaticTimetable {
    occurrences: Vec<ClassOccurrence>,
    rosters: HashMap<String, Vec<String>>,
    broken_rosters: HashSet<String>,
}

impl StaticTimetable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_occurrence(mut self, occurrence: ClassOccurrence, students: &[&str]) -> Self {
        self.rosters.insert(
            occurrence.id.clone(),
            students.iter().map(|s| s.to_string()).collect(),
        );
        self.occurrences.push(occurrence);
        self
    }

    /// Roster lookups for this occurrence fail
    pub fn with_broken_roster(mut self, occurrence_id: &str) -> Self {
        self.broken_rosters.insert(occurrence_id.to_string());
        self
    }
}

#[async_trait]
impl TimetableSource for StaticTimetable {
    async fn list_occurrences(
        &self,
        window: &TimeRange,
    ) -> Result<Vec<ClassOccurrence>, DataAccessError> {
        Ok(self
            .occurrences
            .iter()
            .filter(|o| window.contains(o.starts_at))
            .cloned()
            .collect())
    }

    async fn roster(&self, occurrence: &ClassOccurrence) -> Result<Vec<String>, DataAccessError> {
        if self.broken_rosters.contains(&occurrence.id) {
            return Err(DataAccessError::Timetable {
                reason: format!("roster for {} unavailable", occurrence.id),
            });
        }
        Ok(self.rosters.get(&occurrence.id).cloned().unwrap_or_default())
    }
}
