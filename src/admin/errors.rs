//! HTTP error mapping for the admin gateway and public API.
//!
//! Repository calls return `anyhow::Error`; [`ApiError::from`] looks through
//! the chain for boundary validation errors and PostgreSQL constraint codes
//! and picks the status:
//!
//! | Cause | Status |
//! |-------|--------|
//! | field validation, `DomainError`, SQLSTATE 23514 / 23503 / 23502 / 22P02 / 22003 / 22007 / 22008 | 422 |
//! | SQLSTATE 23505 (unique) | 409 |
//! | missing row / unknown entity | 404 |
//! | capability not granted | 403 |
//! | anything else | 500, detail hidden unless `DEBUG` |

use super::fields::ValidationErrors;
use crate::db::constraint_violation;
use crate::domain::DomainError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Internal error text carried on a 500 response so the debug middleware can
/// expose it when `DEBUG` is on.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{operation} is not permitted on {entity}")]
    Forbidden {
        entity: &'static str,
        operation: &'static str,
    },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("{message}")]
    Constraint {
        message: String,
        constraint: Option<String>,
    },
    #[error("conflicts with an existing row")]
    Conflict { constraint: Option<String> },
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(v) = err.downcast_ref::<ValidationErrors>() {
            return ApiError::Validation(v.clone());
        }
        if let Some(d) = err.chain().find_map(|c| c.downcast_ref::<DomainError>()) {
            return ApiError::Constraint {
                message: d.to_string(),
                constraint: None,
            };
        }
        if let Some((code, constraint)) = constraint_violation(&err) {
            match code.as_str() {
                "23505" => return ApiError::Conflict { constraint },
                "23514" | "23503" | "23502" | "22P02" | "22003" | "22007" | "22008" => {
                    let message = match code.as_str() {
                        "23503" => "references a row that does not exist",
                        "23502" => "a required value is missing",
                        "23514" => "violates a check constraint",
                        _ => "a value is out of range or malformed",
                    };
                    return ApiError::Constraint {
                        message: message.to_string(),
                        constraint,
                    };
                }
                _ => {}
            }
        }
        ApiError::Internal(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Validation(_) | ApiError::Constraint { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => (
                status,
                Json(json!({"error": "validation failed", "fields": errors.0})),
            )
                .into_response(),
            ApiError::Constraint {
                message,
                constraint,
            } => (
                status,
                Json(json!({"error": message, "constraint": constraint})),
            )
                .into_response(),
            ApiError::Conflict { constraint } => (
                status,
                Json(json!({"error": "conflicts with an existing row", "constraint": constraint})),
            )
                .into_response(),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                let mut response = (
                    status,
                    Json(json!({"error": "internal server error"})),
                )
                    .into_response();
                response
                    .extensions_mut()
                    .insert(InternalDetail(format!("{:#}", err)));
                response
            }
            other => (status, Json(json!({"error": other.to_string()}))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_422() {
        let err: ApiError = anyhow::Error::new(ValidationErrors::single("phone", "bad")).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn domain_errors_anywhere_in_chain_are_422() {
        let err = anyhow::Error::new(DomainError::InvalidPhone("12".into())).context("creating student");
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unknown_errors_are_internal_and_hidden() {
        let api: ApiError = anyhow::anyhow!("connection reset by peer").into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = api.into_response();
        let detail = response.extensions().get::<InternalDetail>().unwrap();
        assert!(detail.0.contains("connection reset"));
    }

    #[test]
    fn forbidden_message_names_operation() {
        let api = ApiError::Forbidden {
            entity: "messages",
            operation: "create",
        };
        assert_eq!(api.status(), StatusCode::FORBIDDEN);
        assert_eq!(api.to_string(), "create is not permitted on messages");
    }
}
