//! Admin login and logout.
//!
//! `POST /admin/login` takes form fields `username` and either `password` or
//! `password_hash` (hex SHA-256). A failed login answers `401 {"ok": false}`
//! without saying which field was wrong and leaves no session behind.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::errors::ApiError;
use super::middleware_auth::{new_session_token, session_digest, SESSION_COOKIE};
use super::AppState;

#[derive(Deserialize, Default)]
pub(super) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    password_hash: Option<String>,
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Admin login</title></head>
<body>
<form method="post" action="/admin/login">
  <label>Username <input name="username" autocomplete="username" required></label>
  <label>Password <input name="password" type="password" autocomplete="current-password" required></label>
  <button type="submit">Sign in</button>
</form>
</body>
</html>
"#;

/// GET /admin/login
pub(super) async fn handler_login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/admin")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// POST /admin/login
pub(super) async fn handler_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let settings = &state.settings;
    let ok = settings.admin.verify(
        &form.username,
        form.password.as_deref(),
        form.password_hash.as_deref(),
    );
    state.prom_metrics.record_login(ok);
    if !ok {
        warn!("admin login rejected");
        return Ok((StatusCode::UNAUTHORIZED, Json(json!({"ok": false}))).into_response());
    }

    match state.db.prune_expired_sessions().await {
        Ok(n) if n > 0 => info!(count = n, "pruned expired admin sessions"),
        Err(e) => warn!(error = %e, "failed to prune expired admin sessions"),
        _ => {}
    }

    let token = new_session_token();
    let digest = session_digest(&settings.session_secret, &token);
    let expires_at = chrono::Utc::now() + settings.session_ttl;
    state
        .db
        .create_admin_session(&digest, settings.admin.username(), expires_at)
        .await?;
    info!(username = settings.admin.username(), "admin logged in");

    let jar = jar.add(session_cookie(token, settings.secure_cookies()));
    Ok((
        jar,
        Json(json!({
            "ok": true,
            "username": settings.admin.username(),
            "expires_at": expires_at,
        })),
    )
        .into_response())
}

/// POST /admin/logout. Always succeeds and always clears the cookie.
pub(super) async fn handler_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let digest = session_digest(&state.settings.session_secret, cookie.value());
        if let Err(e) = state.db.delete_admin_session(&digest).await {
            warn!(error = %e, "failed to delete admin session");
        }
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/admin"));
    (jar, Json(json!({"ok": true})))
}
