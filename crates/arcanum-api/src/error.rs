use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error taxonomy for the whole API surface. Every precondition failure in
/// settlement and session handling travels through here as a typed value;
/// the `IntoResponse` impl is the only place status codes are decided.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("invalid credentials")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    InvalidOperation(&'static str),
    #[error("{0}")]
    BadRequest(&'static str),
    /// A persisted invariant is broken. Logged as an operator alert;
    /// clients only see a generic failure.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, (*m).to_string()),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::InvalidOperation(m) | ApiError::BadRequest(m) => {
                (StatusCode::BAD_REQUEST, (*m).to_string())
            }
            ApiError::DataIntegrity(detail) => {
                error!("data integrity violation: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            ApiError::Internal(e) => {
                error!("internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
