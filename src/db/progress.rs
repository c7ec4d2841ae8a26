//! Per-student module progress.
//!
//! One row per (student, module), enforced by `student_module_progress_pair_key`.
//! Writes go through a single `INSERT ... ON CONFLICT DO UPDATE` so concurrent
//! writers never create a duplicate pair. `progress_percent` is a generated
//! column computed from the topic counts.

use super::{Database, ProgressRow};
use crate::domain::{progress_status, ProgressStatus};
use anyhow::Result;

const PROGRESS_COLUMNS: &str = "id, student_id, module_id, status, completed_topics, total_topics,
    progress_percent, created_at, updated_at";

impl Database {
    /// Create or update the progress row for a pair. When `status` is `None`
    /// it is derived from the counts.
    pub async fn upsert_progress(
        &self,
        student_id: i64,
        module_id: i64,
        status: Option<ProgressStatus>,
        completed_topics: i32,
        total_topics: i32,
    ) -> Result<ProgressRow> {
        let status = status.unwrap_or_else(|| progress_status(completed_topics, total_topics));
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "INSERT INTO student_module_progress (student_id, module_id, status, completed_topics, total_topics)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (student_id, module_id) DO UPDATE
             SET status = EXCLUDED.status,
                 completed_topics = EXCLUDED.completed_topics,
                 total_topics = EXCLUDED.total_topics
             RETURNING {}",
            PROGRESS_COLUMNS
        ))
        .bind(student_id)
        .bind(module_id)
        .bind(status.as_str())
        .bind(completed_topics)
        .bind(total_topics)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_progress(&self, student_id: i64, module_id: i64) -> Result<Option<ProgressRow>> {
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {} FROM student_module_progress WHERE student_id = $1 AND module_id = $2",
            PROGRESS_COLUMNS
        ))
        .bind(student_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_student_progress(&self, student_id: i64) -> Result<Vec<ProgressRow>> {
        let rows = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {} FROM student_module_progress WHERE student_id = $1 ORDER BY module_id",
            PROGRESS_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
