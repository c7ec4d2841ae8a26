//! Programs and their cohorts (streams).
//!
//! Deleting a program cascades through every table that hangs off it:
//! streams, students, modules, topics, materials and all per-student records.

use super::{Database, ProgramRow, StreamRow};
use anyhow::Result;
use chrono::NaiveDate;

const PROGRAM_COLUMNS: &str = "id, name, description, total_hours, created_at, updated_at";
const STREAM_COLUMNS: &str = "id, program_id, name, start_date, end_date, description, created_at";

impl Database {
    pub async fn create_program(
        &self,
        name: &str,
        description: Option<&str>,
        total_hours: Option<i32>,
    ) -> Result<ProgramRow> {
        let row = sqlx::query_as::<_, ProgramRow>(&format!(
            "INSERT INTO programs (name, description, total_hours) VALUES ($1, $2, $3)
             RETURNING {}",
            PROGRAM_COLUMNS
        ))
        .bind(name)
        .bind(description)
        .bind(total_hours)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_program(&self, id: i64) -> Result<Option<ProgramRow>> {
        let row = sqlx::query_as::<_, ProgramRow>(&format!(
            "SELECT {} FROM programs WHERE id = $1",
            PROGRAM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All programs, ordered by name.
    pub async fn list_programs(&self) -> Result<Vec<ProgramRow>> {
        let rows = sqlx::query_as::<_, ProgramRow>(&format!(
            "SELECT {} FROM programs ORDER BY name, id",
            PROGRAM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete a program and, through `ON DELETE CASCADE`, everything under it.
    /// Returns false when no such program existed.
    pub async fn delete_program(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM programs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_stream(
        &self,
        program_id: i64,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        description: Option<&str>,
    ) -> Result<StreamRow> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            "INSERT INTO streams (program_id, name, start_date, end_date, description)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            STREAM_COLUMNS
        ))
        .bind(program_id)
        .bind(name)
        .bind(start_date)
        .bind(end_date)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Look up a stream by its exact name. Names are not unique; the most
    /// recently started stream wins.
    pub async fn find_stream_by_name(&self, name: &str) -> Result<Option<StreamRow>> {
        let row = sqlx::query_as::<_, StreamRow>(&format!(
            "SELECT {} FROM streams WHERE name = $1 ORDER BY start_date DESC, id DESC LIMIT 1",
            STREAM_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_streams(&self, program_id: i64) -> Result<Vec<StreamRow>> {
        let rows = sqlx::query_as::<_, StreamRow>(&format!(
            "SELECT {} FROM streams WHERE program_id = $1 ORDER BY start_date, id",
            STREAM_COLUMNS
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Enroll a student into a stream. Enrolling twice is a no-op; returns
    /// true only when a new enrollment was recorded.
    pub async fn enroll_student(&self, student_id: i64, stream_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO student_streams (student_id, stream_id) VALUES ($1, $2)
             ON CONFLICT (student_id, stream_id) DO NOTHING",
        )
        .bind(student_id)
        .bind(stream_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stream ids a student is enrolled in.
    pub async fn student_stream_ids(&self, student_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT stream_id FROM student_streams WHERE student_id = $1 ORDER BY stream_id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
