//! Generic admin CRUD over the entity views.
//!
//! Every handler resolves the entity slug, checks the requested operation
//! against the view's capabilities, and only then touches the store. A
//! read-only entity therefore rejects writes with `403` however the route is
//! reached.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::errors::ApiError;
use super::fields::{parse_payload, PayloadMode, ValidationErrors};
use super::middleware_auth::AdminSession;
use super::views::{find_view, EntityView, Operation, ENTITY_VIEWS};
use super::AppState;
use crate::db::ListQuery;

/// Most ids accepted by one bulk delete.
pub const MAX_BULK_IDS: usize = 1000;

/// Set to `true` on an export that stopped at the row limit.
pub const EXPORT_TRUNCATED_HEADER: &str = "x-export-truncated";

/// Resolve a slug and check the capability before any store access.
pub(super) fn authorize(
    state: &AppState,
    slug: &str,
    op: Operation,
) -> Result<&'static EntityView, ApiError> {
    let view = find_view(slug).ok_or_else(|| ApiError::NotFound(format!("entity '{}'", slug)))?;
    if !view.permits(op) {
        state.prom_metrics.record_denied("capability");
        return Err(ApiError::Forbidden {
            entity: view.slug,
            operation: op.as_str(),
        });
    }
    Ok(view)
}

fn not_found(view: &EntityView, id: i64) -> ApiError {
    ApiError::NotFound(format!("{} {}", view.label, id))
}

/// GET /admin/api/entities: the capability table.
pub(super) async fn handler_entities(_session: AdminSession) -> impl IntoResponse {
    let entities: Vec<Value> = ENTITY_VIEWS
        .iter()
        .map(|v| {
            let fields: Vec<Value> = v
                .fields
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "type": f.kind.type_name(),
                        "required": f.required,
                        "nullable": f.nullable,
                    })
                })
                .collect();
            json!({
                "slug": v.slug,
                "label": v.label,
                "label_plural": v.label_plural,
                "list_columns": v.list_columns,
                "detail_columns": v.detail_columns,
                "searchable": v.search_columns,
                "sortable": v.sortable_columns,
                "fields": fields,
                "capabilities": v.capabilities,
            })
        })
        .collect();
    Json(json!({ "entities": entities }))
}

/// GET /admin/api/{entity}
pub(super) async fn handler_list(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::List)?;
    let page = state.db.list_entities(view, &query).await?;
    Ok(Json(page).into_response())
}

/// GET /admin/api/{entity}/{id}
pub(super) async fn handler_detail(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::Detail)?;
    match state.db.get_entity(view, id).await? {
        Some(row) => Ok(Json(row).into_response()),
        None => Err(not_found(view, id)),
    }
}

/// POST /admin/api/{entity}
pub(super) async fn handler_create(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    Path(entity): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::Create)?;
    let values = parse_payload(view.fields, &payload, PayloadMode::Create)?;
    let row = state.db.create_entity(view, &values).await?;
    state.prom_metrics.record_mutation(view.slug, "create", 1);
    info!(entity = view.slug, id = ?row.get("id"), admin = %session.username, "row created");
    Ok((StatusCode::CREATED, Json(row)).into_response())
}

/// PUT /admin/api/{entity}/{id}
pub(super) async fn handler_update(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::Edit)?;
    let values = parse_payload(view.fields, &payload, PayloadMode::Edit)?;
    match state.db.update_entity(view, id, &values).await? {
        Some(row) => {
            state.prom_metrics.record_mutation(view.slug, "edit", 1);
            info!(entity = view.slug, id, admin = %session.username, "row updated");
            Ok(Json(row).into_response())
        }
        None => Err(not_found(view, id)),
    }
}

/// DELETE /admin/api/{entity}/{id}
pub(super) async fn handler_delete(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    Path((entity, id)): Path<(String, i64)>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::Delete)?;
    if !state.db.delete_entity(view, id).await? {
        return Err(not_found(view, id));
    }
    state.prom_metrics.record_mutation(view.slug, "delete", 1);
    info!(entity = view.slug, id, admin = %session.username, "row deleted");
    Ok(Json(json!({"ok": true, "deleted": 1})).into_response())
}

#[derive(Deserialize)]
pub(super) struct BulkDeleteRequest {
    ids: Vec<i64>,
}

/// POST /admin/api/{entity}/bulk-delete
pub(super) async fn handler_bulk_delete(
    State(state): State<Arc<AppState>>,
    session: AdminSession,
    Path(entity): Path<String>,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::BulkDelete)?;
    if req.ids.is_empty() {
        return Err(ValidationErrors::single("ids", "must not be empty").into());
    }
    if req.ids.len() > MAX_BULK_IDS {
        return Err(
            ValidationErrors::single("ids", format!("at most {} ids per request", MAX_BULK_IDS))
                .into(),
        );
    }
    let mut ids = req.ids;
    ids.sort_unstable();
    ids.dedup();
    let deleted = state.db.bulk_delete_entities(view, &ids).await?;
    state.prom_metrics.record_mutation(view.slug, "bulk_delete", deleted);
    info!(entity = view.slug, requested = ids.len(), deleted, admin = %session.username, "bulk delete");
    Ok(Json(json!({"ok": true, "deleted": deleted})).into_response())
}

/// GET /admin/api/{entity}/cascade: tables a delete would cascade into.
pub(super) async fn handler_cascade(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(entity): Path<String>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::Delete)?;
    let dependents = state.db.cascade_dependents(view).await?;
    Ok(Json(json!({"entity": view.slug, "dependents": dependents})).into_response())
}

#[derive(Deserialize)]
pub(super) struct ExportQuery {
    format: Option<String>,
}

/// GET /admin/api/{entity}/export?format=csv|json
pub(super) async fn handler_export(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(entity): Path<String>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let view = authorize(&state, &entity, Operation::Export)?;
    let format = params.format.as_deref().unwrap_or("csv");
    if format != "csv" && format != "json" {
        return Err(ApiError::BadRequest(format!(
            "unsupported export format '{}' (csv or json)",
            format
        )));
    }
    let export = state.db.export_entities(view).await?;
    if export.truncated {
        warn!(
            entity = view.slug,
            rows = export.rows.len(),
            "export hit the row limit"
        );
    }
    let disposition = format!("attachment; filename=\"{}.{}\"", view.slug, format);
    let (content_type, body) = if format == "json" {
        (
            "application/json",
            serde_json::to_string_pretty(&export.rows).map_err(anyhow::Error::from)?,
        )
    } else {
        (
            "text/csv; charset=utf-8",
            render_csv(view.detail_columns, &export.rows),
        )
    };
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (
                HeaderName::from_static(EXPORT_TRUNCATED_HEADER),
                export.truncated.to_string(),
            ),
        ],
        body,
    )
        .into_response())
}

/// Render rows as CSV with a header line. Strings are always quoted;
/// numbers and booleans are written bare; nulls are empty.
pub(super) fn render_csv(columns: &[&str], rows: &[Value]) -> String {
    let mut out = columns.join(",");
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(*c) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => format!("\"{}\"", s.replace('"', "\"\"")),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                Some(other) => format!("\"{}\"", other.to_string().replace('"', "\"\"")),
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
