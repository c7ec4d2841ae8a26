//! # Probes and Metrics
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `GET /healthz` | Liveness: the process is serving HTTP |
//! | `GET /readyz` | Readiness: database answers within 2 seconds and the schema is at the latest version |
//! | `GET /metrics` | Prometheus scrape |

use super::AppState;
use crate::migrations;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn handler_healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// 503 while the database is unreachable or slow, or while migrations are
/// pending, so traffic is held back until the instance can serve it.
pub async fn handler_readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check = tokio::time::timeout(READY_TIMEOUT, async {
        state.db.health_check().await?;
        migrations::applied_versions(state.db.pool()).await
    })
    .await;

    let expected = migrations::available_versions().last().copied().unwrap_or(0);
    match check {
        Ok(Ok(applied)) => {
            let current = applied.last().copied().unwrap_or(0);
            if current >= expected {
                (StatusCode::OK, Json(json!({"status": "ready", "schema_version": current})))
            } else {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "status": "migrations pending",
                        "schema_version": current,
                        "expected_version": expected,
                    })),
                )
            }
        }
        Ok(Err(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "database unreachable"})),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "database timeout"})),
        ),
    }
}

pub async fn handler_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            "content-type",
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        state.prom_metrics.encode(),
    )
}
