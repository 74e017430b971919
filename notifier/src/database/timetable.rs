//! SQLite-backed timetable reader over the portal's `class_occurrences`
//! and `enrollments` tables.

use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use super::{from_millis, to_millis, Database};
use crate::errors::DataAccessError;
use crate::timetable::{ClassOccurrence, TimeRange, TimetableSource};

pub struct SqliteTimetable {
    database: Arc<Database>,
}

impl SqliteTimetable {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl TimetableSource for SqliteTimetable {
    async fn list_occurrences(
        &self,
        window: &TimeRange,
    ) -> Result<Vec<ClassOccurrence>, DataAccessError> {
        let rows = sqlx::query(
            r#"
            SELECT id, course_code, title, location, starts_at
            FROM class_occurrences
            WHERE starts_at >= ? AND starts_at < ?
            ORDER BY starts_at ASC
            "#,
        )
        .bind(to_millis(window.start))
        .bind(to_millis(window.end))
        .fetch_all(self.database.pool())
        .await
        .map_err(DataAccessError::query("list_occurrences"))?;

        let decode = DataAccessError::query;
        rows.iter()
            .map(|row| -> Result<ClassOccurrence, DataAccessError> {
                Ok(ClassOccurrence {
                    id: row.try_get("id").map_err(decode("decode_occurrence"))?,
                    course_code: row
                        .try_get("course_code")
                        .map_err(decode("decode_occurrence"))?,
                    title: row.try_get("title").map_err(decode("decode_occurrence"))?,
                    location: row
                        .try_get("location")
                        .map_err(decode("decode_occurrence"))?,
                    starts_at: from_millis(
                        "class_occurrences",
                        row.try_get("starts_at")
                            .map_err(decode("decode_occurrence"))?,
                    )?,
                })
            })
            .collect()
    }

    async fn roster(&self, occurrence: &ClassOccurrence) -> Result<Vec<String>, DataAccessError> {
        sqlx::query_scalar(
            "SELECT student_id FROM enrollments WHERE course_code = ? ORDER BY student_id ASC",
        )
        .bind(&occurrence.course_code)
        .fetch_all(self.database.pool())
        .await
        .map_err(DataAccessError::query("roster"))
    }
}
