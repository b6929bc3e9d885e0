use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::request_id::current_request_id;

/// Service level error type covering every failure surfaced to HTTP clients.
#[derive(Error, Debug, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Password hash error: {0}")]
    HashError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error(transparent)]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for the HTTP status of each error variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DatabaseError(_)
            | ServiceError::EventError(_)
            | ServiceError::InternalError(_)
            | ServiceError::HashError(_)
            | ServiceError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ValidationError(_)
            | ServiceError::InvalidOperation(_)
            | ServiceError::InvalidInput(_)
            | ServiceError::BadRequest(_)
            | ServiceError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            ServiceError::AuthError(_)
            | ServiceError::Unauthorized(_)
            | ServiceError::JwtError(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message exposed to clients. Internal failures are masked.
    pub fn response_message(&self) -> String {
        match self {
            ServiceError::DatabaseError(err) => {
                error!(error = %err, "database error");
                "A database error occurred".to_string()
            }
            ServiceError::EventError(msg) => {
                error!(error = %msg, "event delivery error");
                "An internal error occurred".to_string()
            }
            ServiceError::InternalError(msg) => {
                error!(error = %msg, "internal error");
                "An internal error occurred".to_string()
            }
            ServiceError::HashError(msg) => {
                error!(error = %msg, "password hash error");
                "An internal error occurred".to_string()
            }
            ServiceError::Other(err) => {
                error!(error = %err, "unhandled error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Error payload returned to API clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Canonical reason for the HTTP status
    pub error: String,
    /// Human readable message
    pub message: String,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Request ID for correlating logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// When the error was produced
    pub timestamp: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id().map(|id| id.0),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_id::{scope_request_id, RequestId};
    use axum::body::to_bytes;

    #[test]
    fn status_codes_map_by_variant() {
        assert_eq!(
            ServiceError::NotFound("Employee".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InternalError("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::ExternalServiceError("gateway".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_messages_are_masked() {
        let err = ServiceError::InternalError("secret stack trace".into());
        assert_eq!(err.response_message(), "An internal error occurred");

        let err = ServiceError::NotFound("Employee".into());
        assert_eq!(err.response_message(), "Employee not found");
    }

    #[test]
    fn validation_errors_convert() {
        use validator::Validate;

        #[derive(Validate)]
        struct Probe {
            #[validate(length(min = 5))]
            name: String,
        }

        let probe = Probe { name: "ab".into() };
        let err: ServiceError = probe.validate().unwrap_err().into();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn error_response_carries_request_id() {
        let response = scope_request_id(RequestId::new("err-42"), async {
            ServiceError::BadRequest("missing field".into()).into_response()
        })
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["request_id"], "err-42");
        assert_eq!(json["message"], "Bad request: missing field");
    }
}
