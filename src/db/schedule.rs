//! Schedule items for modules, optionally pinned to a topic and a stream.

use super::{Database, NewScheduleItem, ScheduleItemRow};
use anyhow::Result;

const SCHEDULE_COLUMNS: &str = "id, module_id, topic_id, stream_id, kind, scheduled_date,
    start_time, end_time, location, created_at";

impl Database {
    pub async fn create_schedule_item(&self, item: &NewScheduleItem) -> Result<ScheduleItemRow> {
        let row = sqlx::query_as::<_, ScheduleItemRow>(&format!(
            "INSERT INTO schedule_items (module_id, topic_id, stream_id, kind, scheduled_date,
                                         start_time, end_time, location)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            SCHEDULE_COLUMNS
        ))
        .bind(item.module_id)
        .bind(item.topic_id)
        .bind(item.stream_id)
        .bind(item.kind.as_str())
        .bind(item.scheduled_date)
        .bind(item.start_time)
        .bind(item.end_time)
        .bind(&item.location)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// A module's schedule in chronological order.
    pub async fn list_schedule(&self, module_id: i64) -> Result<Vec<ScheduleItemRow>> {
        let rows = sqlx::query_as::<_, ScheduleItemRow>(&format!(
            "SELECT {} FROM schedule_items WHERE module_id = $1
             ORDER BY scheduled_date, start_time NULLS FIRST, id",
            SCHEDULE_COLUMNS
        ))
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
