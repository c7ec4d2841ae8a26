//! Course modules and the topics inside them.
//!
//! `order_index` is advisory: lists sort by it, then by id, and duplicates
//! are allowed.

use super::{CourseModuleRow, Database, NewCourseModule, TopicRow};
use anyhow::Result;

const MODULE_COLUMNS: &str = "id, program_id, order_index, name, description, lecture_hours,
    practice_hours, self_study_hours, created_at, updated_at";
const TOPIC_COLUMNS: &str = "id, module_id, order_index, name, description,
    has_intermediate_assessment, has_final_assessment, created_at, updated_at";

impl Database {
    pub async fn create_module(&self, module: &NewCourseModule) -> Result<CourseModuleRow> {
        let row = sqlx::query_as::<_, CourseModuleRow>(&format!(
            "INSERT INTO course_modules (program_id, order_index, name, description,
                                         lecture_hours, practice_hours, self_study_hours)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            MODULE_COLUMNS
        ))
        .bind(module.program_id)
        .bind(module.order_index)
        .bind(&module.name)
        .bind(&module.description)
        .bind(module.lecture_hours)
        .bind(module.practice_hours)
        .bind(module.self_study_hours)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_modules(&self, program_id: i64) -> Result<Vec<CourseModuleRow>> {
        let rows = sqlx::query_as::<_, CourseModuleRow>(&format!(
            "SELECT {} FROM course_modules WHERE program_id = $1 ORDER BY order_index, id",
            MODULE_COLUMNS
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_topic(
        &self,
        module_id: i64,
        order_index: i32,
        name: &str,
        description: Option<&str>,
        has_intermediate_assessment: bool,
        has_final_assessment: bool,
    ) -> Result<TopicRow> {
        let row = sqlx::query_as::<_, TopicRow>(&format!(
            "INSERT INTO topics (module_id, order_index, name, description,
                                 has_intermediate_assessment, has_final_assessment)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            TOPIC_COLUMNS
        ))
        .bind(module_id)
        .bind(order_index)
        .bind(name)
        .bind(description)
        .bind(has_intermediate_assessment)
        .bind(has_final_assessment)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_topics(&self, module_id: i64) -> Result<Vec<TopicRow>> {
        let rows = sqlx::query_as::<_, TopicRow>(&format!(
            "SELECT {} FROM topics WHERE module_id = $1 ORDER BY order_index, id",
            TOPIC_COLUMNS
        ))
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
