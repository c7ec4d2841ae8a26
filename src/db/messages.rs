//! Append-only conversation log. There is no update path.

use super::{Database, MessageRow};
use crate::domain::SenderRole;
use anyhow::Result;

impl Database {
    pub async fn append_message(
        &self,
        student_id: i64,
        sender_role: SenderRole,
        text_content: &str,
        telegram_message_id: Option<i64>,
    ) -> Result<MessageRow> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (student_id, sender_role, text_content, telegram_message_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id, student_id, sender_role, text_content, telegram_message_id, created_at",
        )
        .bind(student_id)
        .bind(sender_role.as_str())
        .bind(text_content)
        .bind(telegram_message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// The most recent `limit` messages for a student, oldest first.
    pub async fn list_messages(&self, student_id: i64, limit: i64) -> Result<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM (
                 SELECT id, student_id, sender_role, text_content, telegram_message_id, created_at
                 FROM messages WHERE student_id = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT $2
             ) recent ORDER BY created_at, id",
        )
        .bind(student_id)
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
