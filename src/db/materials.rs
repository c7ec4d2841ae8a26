//! Course materials.
//!
//! File payloads live in `file_data` (BYTEA) next to the metadata but are
//! never selected by list or detail queries; only [`Database::load_material_file`]
//! reads them. Storing a file writes name, bytes, size and MIME type in one
//! statement.

use super::{Database, MaterialFile, MaterialRow, NewMaterial};
use crate::domain::validate_url;
use anyhow::Result;

const MATERIAL_COLUMNS: &str = "id, program_id, module_id, topic_id, title, content, external_url,
    category, is_visible, file_name, file_size, mime_type, created_at, updated_at";

impl Database {
    pub async fn create_material(&self, material: &NewMaterial) -> Result<MaterialRow> {
        let external_url = material
            .external_url
            .as_deref()
            .map(validate_url)
            .transpose()?;
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "INSERT INTO course_materials (program_id, module_id, topic_id, title, content,
                                           external_url, category, is_visible)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            MATERIAL_COLUMNS
        ))
        .bind(material.program_id)
        .bind(material.module_id)
        .bind(material.topic_id)
        .bind(&material.title)
        .bind(&material.content)
        .bind(external_url)
        .bind(material.category.as_str())
        .bind(material.is_visible)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_materials(
        &self,
        program_id: i64,
        visible_only: bool,
    ) -> Result<Vec<MaterialRow>> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM course_materials
             WHERE program_id = $1 AND (is_visible OR NOT $2)
             ORDER BY id",
            MATERIAL_COLUMNS
        ))
        .bind(program_id)
        .bind(visible_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Attach a file to a material. Returns the updated metadata, or `None`
    /// when the material does not exist.
    pub async fn store_material_file(
        &self,
        id: i64,
        file_name: &str,
        mime_type: Option<&str>,
        data: &[u8],
    ) -> Result<Option<MaterialRow>> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "UPDATE course_materials
             SET file_name = $2, mime_type = $3, file_data = $4, file_size = $5
             WHERE id = $1
             RETURNING {}",
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .bind(file_name)
        .bind(mime_type)
        .bind(data)
        .bind(data.len() as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// The stored payload, or `None` when the material is missing or has no file.
    pub async fn load_material_file(&self, id: i64) -> Result<Option<MaterialFile>> {
        let row = sqlx::query_as::<_, MaterialFile>(
            "SELECT file_name, mime_type, file_data FROM course_materials
             WHERE id = $1 AND file_data IS NOT NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
