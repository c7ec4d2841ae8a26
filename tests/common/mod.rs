//! Shared test helpers for integration tests.

#![allow(dead_code)]

use ai_tutor::admin::{build_router, AppState};
use ai_tutor::config::ServerArgs;
use ai_tutor::db::Database;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse battery";

/// Skip the test if TEST_DATABASE_URL is not set.
macro_rules! require_db {
    () => {
        if !common::has_test_db() {
            eprintln!("Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set for integration tests")
}

pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// Tests in one binary share a database; each holds this lock for its whole body.
pub async fn db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(())).lock().await
}

/// Connect, bring the schema to the latest version and empty every table.
pub async fn setup_test_db() -> Database {
    let db = Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    ai_tutor::migrations::run_pending(db.pool())
        .await
        .expect("migrations failed");
    truncate_all_tables(db.pool()).await;
    db
}

pub async fn truncate_all_tables(pool: &sqlx::PgPool) {
    sqlx::raw_sql(
        "TRUNCATE TABLE feedback, test_results, attestation_tests, schedule_items,
                       rate_limits, messages, student_module_progress, course_materials,
                       topics, course_modules, student_streams, students, streams,
                       programs, admin_sessions
         RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await
    .unwrap();
}

/// Group configuration served by `/api/v1/config` in tests.
pub fn write_group_config() -> PathBuf {
    let path = std::env::temp_dir().join(format!("ai-tutor-config-{}.json", uuid::Uuid::new_v4()));
    let config = serde_json::json!({
        "programs": {
            "ds": {
                "name": "Data Science",
                "chat_link": "https://t.me/ds",
                "groups": {
                    "ds-2025-1": {"chat_link": "https://t.me/ds-1", "curator": "Ivanova"}
                }
            }
        }
    });
    std::fs::write(&path, config.to_string()).unwrap();
    path
}

pub fn test_server_args() -> ServerArgs {
    ServerArgs {
        admin_username: ADMIN_USER.to_string(),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        session_secret: Some("test-session-secret-with-enough-length".to_string()),
        group_config_path: write_group_config(),
        ..Default::default()
    }
}

/// Router plus state over a freshly emptied database.
pub async fn build_test_app() -> (Router, Arc<AppState>) {
    build_test_app_with(test_server_args()).await
}

pub async fn build_test_app_with(args: ServerArgs) -> (Router, Arc<AppState>) {
    let db = setup_test_db().await;
    let mut settings = args.into_settings().unwrap();
    settings.database_host = ai_tutor::db::display_host(&test_db_url());
    let state = AppState::new(db, settings);
    (build_router(state.clone()), state)
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn json_body(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap_or(serde_json::Value::Null)
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder().uri(uri);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    let (status, _, body) = send(app, req.body(Body::empty()).unwrap()).await;
    (status, json_body(&body))
}

pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    let (status, _, body) = send(app, req.body(Body::from(body.to_string())).unwrap()).await;
    (status, json_body(&body))
}

pub async fn post_form(
    app: &Router,
    uri: &str,
    form: &str,
) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    let (status, headers, body) = send(app, req).await;
    (status, headers, json_body(&body))
}

/// Log in as the configured admin; returns a `Cookie` header value.
pub async fn login(app: &Router) -> String {
    let form = format!(
        "username={}&password={}",
        ADMIN_USER,
        urlencoding::encode(ADMIN_PASSWORD)
    );
    let (status, headers, _) = post_form(app, "/admin/login", &form).await;
    assert_eq!(status, StatusCode::OK, "login failed");
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}
