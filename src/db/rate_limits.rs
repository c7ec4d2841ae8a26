//! Daily per-student request counters.
//!
//! At most one row per (student, date). The increment is a single
//! upsert that returns the post-increment count, so N concurrent callers
//! observe N distinct values and the stored count ends at exactly N.
//! Limits are advisory: nothing here rejects a request.

use super::Database;
use anyhow::Result;
use chrono::NaiveDate;

impl Database {
    /// Increment the counter for `(student_id, date)` and return the new value.
    pub async fn increment_rate_limit(&self, student_id: i64, date: NaiveDate) -> Result<i32> {
        let count = sqlx::query_scalar::<_, i32>(
            "INSERT INTO rate_limits (student_id, limit_date, request_count)
             VALUES ($1, $2, 1)
             ON CONFLICT (student_id, limit_date) DO UPDATE
             SET request_count = rate_limits.request_count + 1
             RETURNING request_count",
        )
        .bind(student_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Current count, 0 when no row exists yet.
    pub async fn get_rate_limit_count(&self, student_id: i64, date: NaiveDate) -> Result<i32> {
        let count = sqlx::query_scalar::<_, i32>(
            "SELECT request_count FROM rate_limits WHERE student_id = $1 AND limit_date = $2",
        )
        .bind(student_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Whether the student is still under `max_per_day` for `date`.
    pub async fn check_rate_limit(
        &self,
        student_id: i64,
        date: NaiveDate,
        max_per_day: i32,
    ) -> Result<bool> {
        Ok(self.get_rate_limit_count(student_id, date).await? < max_per_day)
    }
}
