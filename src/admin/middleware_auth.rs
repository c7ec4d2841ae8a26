//! Session gate for `/admin` routes.
//!
//! A successful login issues a random token in the `ai_tutor_admin` cookie.
//! The server stores only `sha256(session_secret || 0x00 || token)` in
//! `admin_sessions`, and every gated request re-checks that digest against
//! the table. A missing cookie, unknown or expired session, or a store error
//! all deny access: `GET` requests are redirected to the login page, other
//! methods get `401`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use super::AppState;

pub const SESSION_COOKIE: &str = "ai_tutor_admin";
pub const LOGIN_PATH: &str = "/admin/login";

/// 64 hex characters drawn from two v4 UUIDs (244 random bits).
pub fn new_session_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Keyed digest of a session token, as stored in `admin_sessions.token_digest`.
pub fn session_digest(secret: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update([0u8]);
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// An authenticated admin session, extracted from the cookie.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
}

fn deny(method: &Method) -> Response {
    if method == Method::GET || method == Method::HEAD {
        Redirect::to(LOGIN_PATH).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Authentication required"})),
        )
            .into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            state.prom_metrics.record_denied("session");
            return Err(deny(&parts.method));
        };
        let digest = session_digest(&state.settings.session_secret, &token);
        match state.db.find_admin_session(&digest).await {
            Ok(Some(username)) => Ok(AdminSession { username }),
            Ok(None) => {
                state.prom_metrics.record_denied("session");
                Err(deny(&parts.method))
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed; denying");
                state.prom_metrics.record_denied("session");
                Err(deny(&parts.method))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn digest_depends_on_secret_and_token() {
        let d = session_digest("secret", "token");
        assert_eq!(d.len(), 64);
        assert_eq!(d, session_digest("secret", "token"));
        assert_ne!(d, session_digest("other", "token"));
        assert_ne!(d, session_digest("secret", "token2"));
        // The separator keeps (secret, token) boundaries unambiguous.
        assert_ne!(session_digest("ab", "c"), session_digest("a", "bc"));
    }

    #[test]
    fn denial_redirects_reads_and_rejects_writes() {
        let get = deny(&Method::GET);
        assert_eq!(get.status(), StatusCode::SEE_OTHER);
        assert_eq!(get.headers()["location"], LOGIN_PATH);
        assert_eq!(deny(&Method::POST).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(deny(&Method::DELETE).status(), StatusCode::UNAUTHORIZED);
    }
}
