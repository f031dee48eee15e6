//! API error types and responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_bridge::BridgeError;
use serde::Serialize;
use thiserror::Error;

use crate::core::OperationError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Operation(#[from] OperationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown route; carries the received path
    #[error("Invalid API path")]
    InvalidPath(String),

    /// Known route, wrong method; carries the received method
    #[error("Invalid HTTP method")]
    InvalidMethod(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Operation(err) => {
                let status = match err {
                    OperationError::InvalidRequest(_) | OperationError::UnsupportedCommand(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    OperationError::NotFound(_) => StatusCode::NOT_FOUND,
                    OperationError::ProvisionFailed(_)
                    | OperationError::UnprovisionFailed(_)
                    | OperationError::PreparationFailed(_)
                    | OperationError::PublishFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind())
            }
            ApiError::InvalidRequest(_) | ApiError::InvalidPath(_) | ApiError::InvalidMethod(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
            }
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let details = match &self {
            ApiError::InvalidPath(path) => Some(serde_json::json!({ "received_path": path })),
            ApiError::InvalidMethod(method) => {
                Some(serde_json::json!({ "received_method": method }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(format!("Invalid JSON in request body: {}", rejection.body_text()))
    }
}

/// Errors from reading firmware through a capability URL
impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::AccessDenied(msg) => ApiError::Forbidden(msg),
            BridgeError::ResourceNotFound(msg) => ApiError::NotFound(msg),
            BridgeError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_status_codes() {
        let cases = [
            (OperationError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (OperationError::UnsupportedCommand("x".into()), StatusCode::BAD_REQUEST),
            (OperationError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (OperationError::ProvisionFailed("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (OperationError::UnprovisionFailed("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (OperationError::PreparationFailed("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (OperationError::PublishFailed("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let (status, code) = ApiError::from(err.clone()).status_and_code();
            assert_eq!(status, expected, "{:?}", err);
            assert_eq!(code, err.kind());
        }
    }

    #[test]
    fn test_capability_errors_are_forbidden() {
        let err = ApiError::from(BridgeError::AccessDenied("expired".into()));
        assert_eq!(err.status_and_code().0, StatusCode::FORBIDDEN);
    }
}
