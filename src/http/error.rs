use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::error::CoreError;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    max_allowed: Option<f64>,
    reason: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_allowed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            max_allowed: None,
            reason: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            reason: Some(reason.clone()),
            ..Self::new(StatusCode::FORBIDDEN, reason)
        }
    }

    pub fn max_exceeded(max_allowed: f64) -> Self {
        Self {
            max_allowed: Some(max_allowed),
            ..Self::new(
                StatusCode::BAD_REQUEST,
                CoreError::MaxExceeded { max_allowed }.to_string(),
            )
        }
    }

    /// Map a service failure, logging unexpected ones under `context`.
    ///
    /// Internal details never reach the response body.
    pub fn from_core(err: CoreError, context: &'static str) -> Self {
        match err {
            CoreError::InvalidInput(message) => Self::bad_request(message),
            CoreError::Unauthorized => Self::unauthorized("unauthorized"),
            CoreError::NotFound(message) => Self::not_found(message),
            CoreError::Forbidden { reason } => Self::forbidden(reason),
            CoreError::MaxExceeded { max_allowed } => Self::max_exceeded(max_allowed),
            CoreError::Conflict(message) => Self::conflict(message),
            CoreError::Internal(err) => {
                tracing::error!(error = ?err, "{}", context);
                Self::internal(context)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::from_core(err, "internal error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            max_allowed: self.max_allowed,
            reason: self.reason,
        });
        (self.status, body).into_response()
    }
}
