//! Student records.
//!
//! Phone numbers are validated before the insert; the column's `CHECK` and
//! `UNIQUE` constraints back that up at the store.

use super::{Database, NewStudent, StudentRow};
use crate::domain::{validate_phone, StudentStatus};
use anyhow::Result;

const STUDENT_COLUMNS: &str = "id, first_name, last_name, middle_name, phone, telegram_user_id,
    telegram_chat_id, telegram_username, status, program_id, last_login_at, created_at, updated_at";

impl Database {
    /// Insert a student with status `active`.
    pub async fn create_student(&self, student: &NewStudent) -> Result<StudentRow> {
        let phone = validate_phone(&student.phone)?;
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "INSERT INTO students (first_name, last_name, middle_name, phone, telegram_user_id,
                                   telegram_chat_id, telegram_username, status, program_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            STUDENT_COLUMNS
        ))
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.middle_name)
        .bind(&phone)
        .bind(student.telegram_user_id)
        .bind(student.telegram_chat_id)
        .bind(&student.telegram_username)
        .bind(StudentStatus::Active.as_str())
        .bind(student.program_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_student(&self, id: i64) -> Result<Option<StudentRow>> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {} FROM students WHERE id = $1",
            STUDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Exact lookup after normalizing the phone. A malformed phone can never
    /// match a stored row, so it returns `None` rather than an error.
    pub async fn find_student_by_phone(&self, phone: &str) -> Result<Option<StudentRow>> {
        let Ok(phone) = validate_phone(phone) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {} FROM students WHERE phone = $1",
            STUDENT_COLUMNS
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_student_by_telegram(&self, telegram_user_id: i64) -> Result<Option<StudentRow>> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {} FROM students WHERE telegram_user_id = $1",
            STUDENT_COLUMNS
        ))
        .bind(telegram_user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Returns the updated row, or `None` when the student does not exist.
    pub async fn update_student_status(
        &self,
        id: i64,
        status: StudentStatus,
    ) -> Result<Option<StudentRow>> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "UPDATE students SET status = $2 WHERE id = $1 RETURNING {}",
            STUDENT_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Stamp `last_login_at` and bind the Telegram identity seen at login.
    pub async fn touch_student_login(
        &self,
        id: i64,
        telegram_user_id: Option<i64>,
        telegram_chat_id: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE students
             SET last_login_at = NOW(),
                 telegram_user_id = COALESCE($2, telegram_user_id),
                 telegram_chat_id = COALESCE($3, telegram_chat_id)
             WHERE id = $1",
        )
        .bind(id)
        .bind(telegram_user_id)
        .bind(telegram_chat_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_student(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
