//! API error types and conversions

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::protocols::snmp::SnmpError;
use crate::registry::RegistryError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters or body
    InvalidRequest(String),

    /// Resource not found
    NotFound(String),

    /// The device could not be reached or answered with an error
    Upstream(String),

    /// Internal server error
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            ApiError::InvalidRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Upstream(msg)
            | ApiError::Internal(msg) => msg,
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<SnmpError> for ApiError {
    fn from(err: SnmpError) -> Self {
        if err.is_caller_error() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Upstream(err.to_string())
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        if err.is_caller_error() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Upstream(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
