//! # Admin: HTTP Server and Back-Office Gateway
//!
//! Runs the Axum server: the session-gated admin gateway under `/admin`, the
//! public `/api/v1` surface, and the operational probes.
//!
//! ## Route map
//!
//! | Path | Auth | Module |
//! |------|------|--------|
//! | `/`, `/health`, `/api/v1/*` | none | [`routes_api`] |
//! | `/healthz`, `/readyz`, `/metrics` | none | [`routes_health`] |
//! | `/admin/login`, `/admin/logout` | none | [`routes_auth`] |
//! | `/admin/api/*` | session cookie | [`routes_entities`], [`routes_files`] |

pub mod errors;
pub mod fields;
pub(crate) mod middleware_auth;
mod routes_api;
mod routes_auth;
mod routes_entities;
mod routes_files;
mod routes_health;
pub mod views;

use crate::config::{AllowedOrigins, Settings};
use crate::{db, prom_metrics};
use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use errors::InternalDetail;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};

pub use routes_files::MAX_UPLOAD_BYTES;

/// Room for multipart framing around a maximal upload.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

/// Metrics path label for requests that matched no route.
pub const UNMATCHED_PATH: &str = "unmatched";

pub struct AppState {
    pub db: db::Database,
    pub settings: Settings,
    pub prom_metrics: prom_metrics::Metrics,
}

impl AppState {
    pub fn new(db: db::Database, settings: Settings) -> Arc<Self> {
        Arc::new(AppState {
            db,
            settings,
            prom_metrics: prom_metrics::Metrics::new(),
        })
    }
}

/// Records request latency, tags the request with an id (propagated from
/// `x-request-id` or generated) and runs the handler inside a span carrying it.
async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = method_label(req.method());
    let raw_path = req.uri().path().to_string();
    let route = route_label(req.extensions().get::<MatchedPath>());
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let mut response = next.run(req).instrument(span).await;

    state
        .prom_metrics
        .http_request_duration
        .get_or_create(&prom_metrics::HttpLabel {
            method,
            path: route,
        })
        .observe(start.elapsed().as_secs_f64());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// With `DEBUG` on, swap the generic 500 body for one carrying the error chain.
async fn debug_detail_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if !state.settings.debug {
        return response;
    }
    match response.extensions().get::<InternalDetail>() {
        Some(InternalDetail(detail)) => (
            response.status(),
            Json(serde_json::json!({
                "error": "internal server error",
                "detail": detail,
            })),
        )
            .into_response(),
        None => response,
    }
}

/// The route template (`/admin/api/{entity}/{id}`) when a route matched,
/// else one shared label, so the series count is bounded by the route table.
fn method_label(method: &Method) -> String {
    match *method {
        Method::GET
        | Method::HEAD
        | Method::POST
        | Method::PUT
        | Method::PATCH
        | Method::DELETE
        | Method::OPTIONS => method.as_str().to_string(),
        _ => "OTHER".to_string(),
    }
}

fn route_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    match origins {
        AllowedOrigins::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!(origin = %o, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(values))
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_api = Router::new()
        .route("/admin/api/entities", get(routes_entities::handler_entities))
        .route(
            "/admin/api/{entity}",
            get(routes_entities::handler_list).post(routes_entities::handler_create),
        )
        .route("/admin/api/{entity}/export", get(routes_entities::handler_export))
        .route("/admin/api/{entity}/cascade", get(routes_entities::handler_cascade))
        .route(
            "/admin/api/{entity}/bulk-delete",
            post(routes_entities::handler_bulk_delete),
        )
        .route(
            "/admin/api/{entity}/{id}",
            get(routes_entities::handler_detail)
                .put(routes_entities::handler_update)
                .delete(routes_entities::handler_delete),
        )
        .route(
            "/admin/api/{entity}/{id}/file",
            get(routes_files::handler_download).post(routes_files::handler_upload),
        );

    Router::new()
        .route("/", get(routes_api::handler_root))
        .route("/health", get(routes_api::handler_health))
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .route("/api/v1/students", get(routes_api::handler_students))
        .route("/api/v1/students/facts", get(routes_api::handler_facts))
        .route("/api/v1/materials", get(routes_api::handler_materials))
        .route("/api/v1/messages", get(routes_api::handler_messages))
        .route("/api/v1/groups/config", get(routes_api::handler_groups))
        .route("/api/v1/config", get(routes_api::handler_group_config))
        .route(
            "/admin/login",
            get(routes_auth::handler_login_page).post(routes_auth::handler_login),
        )
        .route("/admin/logout", post(routes_auth::handler_logout))
        .merge(admin_api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            debug_detail_middleware,
        ))
        .layer(cors_layer(&state.settings.allowed_origins))
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with_state(state)
}

pub async fn run(settings: Settings, database: db::Database) -> Result<()> {
    let port = settings.port;
    info!(
        app = %settings.app_name,
        version = %settings.app_version,
        environment = settings.environment.as_str(),
        database = %settings.database_host,
        "starting server"
    );
    let state = AppState::new(database, settings);
    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}
