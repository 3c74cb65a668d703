//! Response envelopes and error mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clover_core::Error as CoreError;
use clover_egress::EgressError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Success envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Error envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: error.into(),
        }
    }
}

/// Admin configuration page, rendered as JSON
///
/// `config` holds indented configuration JSON: the stored configuration on
/// success, the submitted text on failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminView {
    pub config: String,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Ingress error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Egress(#[from] EgressError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("not found: {0}")]
    RouteNotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl ApiError {
    fn internal() -> (StatusCode, ErrorResponse) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("server error", "internal error"),
        )
    }

    /// Status code and envelope for this error
    pub fn to_parts(&self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::Core(err) => match err {
                CoreError::Validation(_) | CoreError::Serialization(_) => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("invalid configuration", err.to_string()),
                ),
                CoreError::InterchangeNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("interchange not found", err.to_string()),
                ),
                CoreError::ChannelNotFound(_) => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("channel not found", err.to_string()),
                ),
                CoreError::OwnershipMismatch { .. } => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("channel does not belong to interchange", err.to_string()),
                ),
                CoreError::MissingField(_) => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(err.to_string(), err.to_string()),
                ),
                CoreError::Integrity(_)
                | CoreError::Database(_)
                | CoreError::Config(_)
                | CoreError::Io(_) => Self::internal(),
            },
            ApiError::Egress(err) if err.is_timeout() => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse::new("request timed out", err.to_string()),
            ),
            ApiError::Egress(_) => Self::internal(),
            ApiError::InvalidBody(_) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid request", self.to_string()),
            ),
            ApiError::RouteNotFound(_) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not found", self.to_string()),
            ),
            ApiError::MethodNotAllowed(_) => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("method not allowed", self.to_string()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_parts();

        if status.is_server_error() {
            match &self {
                ApiError::Core(CoreError::Integrity(msg)) => {
                    error!("Data integrity fault: {}", msg)
                }
                ApiError::Egress(_) => {}
                other => error!("Request failed: {}", other),
            }
        }

        (status, Json(body)).into_response()
    }
}

/// Ingress result type
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use clover_core::{ChannelId, InterchangeId, ValidationErrors};
    use std::time::Duration;

    #[test]
    fn test_not_found_mapping() {
        let (status, body) =
            ApiError::from(CoreError::InterchangeNotFound("abc".to_string())).to_parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "interchange not found");
        assert!(body.error.contains("interchange not found"));
    }

    #[test]
    fn test_missing_field_mapping() {
        let (status, body) = ApiError::from(CoreError::MissingField("sender")).to_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "missing sender");
    }

    #[test]
    fn test_validation_mapping() {
        let mut errors = ValidationErrors::new();
        errors.push("interchanges[0].name", "is required");
        let (status, body) = ApiError::from(CoreError::Validation(errors)).to_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("interchanges[0].name"));
    }

    #[test]
    fn test_ownership_mismatch_is_bad_request() {
        let err = CoreError::OwnershipMismatch {
            channel: ChannelId::new(),
            interchange: InterchangeId::new(),
        };
        let (status, _) = ApiError::from(err).to_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors_are_generic() {
        for err in [
            CoreError::Integrity("dangling default".to_string()),
            CoreError::Database("connection reset".to_string()),
        ] {
            let (status, body) = ApiError::from(err).to_parts();
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body.message, "server error");
            assert_eq!(body.error, "internal error");
        }
    }

    #[test]
    fn test_timeout_is_gateway_timeout() {
        let err = ApiError::from(EgressError::Timeout(Duration::from_secs(30)));
        let (status, body) = err.to_parts();
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.message, "request timed out");
    }

    #[test]
    fn test_downstream_detail_is_hidden() {
        let err = ApiError::from(EgressError::InvalidUrl {
            url: "http://internal.example:9999".to_string(),
            reason: "bad".to_string(),
        });
        let (status, body) = err.to_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.contains("internal.example"));
    }
}
