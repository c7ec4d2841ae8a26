//! File payloads attached to course materials.
//!
//! Uploads are multipart with a single `file` part. Name, bytes, size and
//! MIME type are written together in one statement; ordinary field edits
//! never touch the payload.

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::info;

use super::errors::ApiError;
use super::fields::ValidationErrors;
use super::middleware_auth::AdminSession;
use super::routes_entities::authorize;
use super::views::Operation;
use super::AppState;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const FILE_ENTITY: &str = "course_materials";

/// Reduce a client-supplied file name to a safe display name: last path
/// segment only, no control characters or quotes, at most 255 characters.
pub(super) fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(255)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

fn file_entity(entity: &str) -> Result<(), ApiError> {
    if entity == FILE_ENTITY {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("files for entity '{}'", entity)))
    }
}

/// POST /admin/api/course_materials/{id}/file
pub(super) async fn handler_upload(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    file_entity(&entity)?;
    let view = authorize(&state, &entity, Operation::Edit)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = sanitize_file_name(field.file_name().unwrap_or(""));
        let mime_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
        upload = Some((file_name, mime_type, data));
        break;
    }
    let Some((file_name, mime_type, data)) = upload else {
        return Err(ValidationErrors::single("file", "is required").into());
    };
    if data.is_empty() {
        return Err(ValidationErrors::single("file", "must not be empty").into());
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ValidationErrors::single("file", "must be at most 10 MiB").into());
    }

    match state
        .db
        .store_material_file(id, &file_name, mime_type.as_deref(), &data)
        .await?
    {
        Some(material) => {
            state.prom_metrics.record_mutation(view.slug, "upload", 1);
            info!(id, file_name = %file_name, bytes = data.len(), admin = %session.username, "material file stored");
            Ok(Json(material).into_response())
        }
        None => Err(ApiError::NotFound(format!("{} {}", view.label, id))),
    }
}

/// GET /admin/api/course_materials/{id}/file
pub(super) async fn handler_download(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
) -> Result<Response, ApiError> {
    file_entity(&entity)?;
    authorize(&state, &entity, Operation::Detail)?;
    let Some(file) = state.db.load_material_file(id).await? else {
        return Err(ApiError::NotFound(format!("file for material {}", id)));
    };
    let name = sanitize_file_name(file.file_name.as_deref().unwrap_or(""));
    let mime = file
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        file.file_data,
    )
        .into_response())
}
