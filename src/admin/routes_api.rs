//! Public endpoints outside the admin gateway.
//!
//! - `GET /` and `GET /health`: service identity and status.
//! - `/api/v1/*`: placeholders for the student-facing API, plus the group
//!   configuration lookup used by the bot.
//!
//! The group configuration file has the shape
//! `{"programs": {"<program_id>": {..., "groups": {"<group_id>": {...}}}}}`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::errors::ApiError;
use super::AppState;

/// GET /
pub(super) async fn handler_root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let s = &state.settings;
    Json(json!({
        "message": format!("Welcome to {}", s.app_name),
        "version": s.app_version,
        "environment": s.environment,
        "database_url": s.database_host,
    }))
}

/// GET /health
pub(super) async fn handler_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "environment": state.settings.environment,
        "debug": state.settings.debug,
    }))
}

fn coming_soon(name: &str) -> Json<Value> {
    Json(json!({ "message": format!("{} API - coming soon", name) }))
}

pub(super) async fn handler_students() -> Json<Value> {
    coming_soon("Students")
}

pub(super) async fn handler_materials() -> Json<Value> {
    coming_soon("Materials")
}

pub(super) async fn handler_messages() -> Json<Value> {
    coming_soon("Messages")
}

pub(super) async fn handler_facts() -> Json<Value> {
    coming_soon("Facts")
}

pub(super) async fn handler_groups() -> Json<Value> {
    coming_soon("Group")
}

#[derive(Debug, PartialEq)]
pub(super) enum GroupLookup {
    /// No program requested: the whole document.
    All(Value),
    /// Program requested without a group.
    Program(Value),
    /// Program fields overlaid with the group's; `start_date` still to fill.
    Group { merged: Value, group_id: String },
    ProgramNotFound,
    GroupNotFound,
}

/// Resolve a program/group pair in the configuration document.
pub(super) fn lookup_group(config: &Value, program_id: Option<&str>, group_id: Option<&str>) -> GroupLookup {
    let Some(program_id) = program_id.filter(|p| !p.is_empty()) else {
        return GroupLookup::All(config.clone());
    };
    let Some(program) = config
        .get("programs")
        .and_then(|p| p.get(program_id))
        .filter(|p| p.is_object())
    else {
        return GroupLookup::ProgramNotFound;
    };
    let Some(group_id) = group_id.filter(|g| !g.is_empty()) else {
        return GroupLookup::Program(program.clone());
    };
    let Some(group) = program
        .get("groups")
        .and_then(|g| g.get(group_id))
        .and_then(Value::as_object)
    else {
        return GroupLookup::GroupNotFound;
    };
    let mut merged = program.clone();
    if let Some(obj) = merged.as_object_mut() {
        for (k, v) in group {
            obj.insert(k.clone(), v.clone());
        }
    }
    GroupLookup::Group {
        merged,
        group_id: group_id.to_string(),
    }
}

#[derive(Deserialize)]
pub(super) struct ConfigQuery {
    program_id: Option<String>,
    group_id: Option<String>,
}

/// GET /api/v1/config?program_id=..&group_id=..
///
/// A group's `start_date` comes from the stream whose name equals the group id.
pub(super) async fn handler_group_config(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfigQuery>,
) -> Result<Response, ApiError> {
    let path = &state.settings.group_config_path;
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("reading group config {}: {}", path.display(), e))?;
    let config: Value = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing group config {}: {}", path.display(), e))?;

    let response = match lookup_group(&config, params.program_id.as_deref(), params.group_id.as_deref()) {
        GroupLookup::All(v) | GroupLookup::Program(v) => Json(v).into_response(),
        GroupLookup::ProgramNotFound => {
            (StatusCode::NOT_FOUND, Json(json!({"error": "Program not found"}))).into_response()
        }
        GroupLookup::GroupNotFound => {
            (StatusCode::NOT_FOUND, Json(json!({"error": "Group not found"}))).into_response()
        }
        GroupLookup::Group { mut merged, group_id } => {
            let start_date = state
                .db
                .find_stream_by_name(&group_id)
                .await?
                .map(|s| s.start_date.to_string());
            if let Some(obj) = merged.as_object_mut() {
                obj.insert("start_date".to_string(), json!(start_date));
            }
            Json(merged).into_response()
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Value {
        json!({
            "programs": {
                "ds": {
                    "name": "Data Science",
                    "chat_link": "https://t.me/ds",
                    "groups": {
                        "ds-2025-1": {"chat_link": "https://t.me/ds-1", "curator": "Ivanova"}
                    }
                }
            }
        })
    }

    #[test]
    fn no_program_returns_everything() {
        assert_eq!(lookup_group(&config(), None, None), GroupLookup::All(config()));
        assert_eq!(lookup_group(&config(), Some(""), Some("x")), GroupLookup::All(config()));
    }

    #[test]
    fn unknown_program_and_group() {
        assert_eq!(lookup_group(&config(), Some("ml"), None), GroupLookup::ProgramNotFound);
        assert_eq!(lookup_group(&config(), Some("ds"), Some("nope")), GroupLookup::GroupNotFound);
    }

    #[test]
    fn program_without_group() {
        match lookup_group(&config(), Some("ds"), None) {
            GroupLookup::Program(p) => assert_eq!(p["name"], "Data Science"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn group_fields_override_program_fields() {
        match lookup_group(&config(), Some("ds"), Some("ds-2025-1")) {
            GroupLookup::Group { merged, group_id } => {
                assert_eq!(group_id, "ds-2025-1");
                assert_eq!(merged["name"], "Data Science");
                assert_eq!(merged["chat_link"], "https://t.me/ds-1");
                assert_eq!(merged["curator"], "Ivanova");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn stubs_announce_coming_soon() {
        let Json(body) = handler_facts().await;
        assert_eq!(body, json!({"message": "Facts API - coming soon"}));
    }
}
