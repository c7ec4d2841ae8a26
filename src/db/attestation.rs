//! Attestation tests, their results, and student feedback.

use super::{AttestationTestRow, Database, FeedbackRow, TestResultRow};
use crate::domain::{AttestationKind, FeedbackKind};
use anyhow::{bail, Result};

const TEST_COLUMNS: &str =
    "id, module_id, title, kind, max_score, passing_score, is_active, created_at, updated_at";
const RESULT_COLUMNS: &str = "id, test_id, student_id, attempt, score, passed, submitted_at";

impl Database {
    pub async fn create_attestation_test(
        &self,
        module_id: i64,
        title: &str,
        kind: AttestationKind,
        max_score: i32,
        passing_score: i32,
    ) -> Result<AttestationTestRow> {
        let row = sqlx::query_as::<_, AttestationTestRow>(&format!(
            "INSERT INTO attestation_tests (module_id, title, kind, max_score, passing_score)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            TEST_COLUMNS
        ))
        .bind(module_id)
        .bind(title)
        .bind(kind.as_str())
        .bind(max_score)
        .bind(passing_score)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Record an attempt. `passed` is derived from the test's passing score
    /// inside the same statement; the attempt number is the next free one
    /// for this (test, student). A concurrent duplicate attempt number is
    /// rejected by `test_results_attempt_key`.
    pub async fn record_test_result(
        &self,
        test_id: i64,
        student_id: i64,
        score: i32,
    ) -> Result<TestResultRow> {
        if score < 0 {
            bail!("score must be non-negative, got {}", score);
        }
        let row = sqlx::query_as::<_, TestResultRow>(&format!(
            "INSERT INTO test_results (test_id, student_id, attempt, score, passed)
             SELECT t.id, $2,
                    COALESCE((SELECT MAX(attempt) FROM test_results
                              WHERE test_id = $1 AND student_id = $2), 0) + 1,
                    $3, $3 >= t.passing_score
             FROM attestation_tests t WHERE t.id = $1
             RETURNING {}",
            RESULT_COLUMNS
        ))
        .bind(test_id)
        .bind(student_id)
        .bind(score)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(row),
            None => bail!("attestation test {} not found", test_id),
        }
    }

    pub async fn list_test_results(&self, test_id: i64) -> Result<Vec<TestResultRow>> {
        let rows = sqlx::query_as::<_, TestResultRow>(&format!(
            "SELECT {} FROM test_results WHERE test_id = $1 ORDER BY student_id, attempt",
            RESULT_COLUMNS
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_feedback(
        &self,
        student_id: i64,
        module_id: Option<i64>,
        kind: FeedbackKind,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<FeedbackRow> {
        if !(1..=5).contains(&rating) {
            bail!("rating must be between 1 and 5, got {}", rating);
        }
        let row = sqlx::query_as::<_, FeedbackRow>(
            "INSERT INTO feedback (student_id, module_id, kind, rating, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, student_id, module_id, kind, rating, comment, created_at",
        )
        .bind(student_id)
        .bind(module_id)
        .bind(kind.as_str())
        .bind(rating)
        .bind(comment)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
