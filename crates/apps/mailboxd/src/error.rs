//! HTTP error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mailbox::MailboxError;
use serde_json::json;

/// Errors returned by the HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    /// The request itself was malformed
    BadRequest(String),
    /// Identity could not be established for the caller
    Forbidden(String),
    Internal(String),
}

impl From<MailboxError> for ApiError {
    fn from(err: MailboxError) -> Self {
        if err.is_access_denied() {
            ApiError::Forbidden(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        log::error!("Request failed ({}): {}", status, message);
        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}
