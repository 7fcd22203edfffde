use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use tracing::error;

use crate::models::requisition::RequisitionError;
use crate::serpro::SerproError;
use crate::services::auth_service::AuthError;
use crate::services::document_service::DocumentError;

/// Error returned by handlers, rendered as `{"error": .., "message": ..}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    /// The remote gateway failed or declined to produce a document.
    BadGateway { error: &'static str, message: String },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "invalid request", message),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "authentication required".to_string(),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not found", message),
            ApiError::BadGateway { error, message } => (StatusCode::BAD_GATEWAY, error, message),
            ApiError::Internal(message) => {
                error!(message = %message, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error",
                    "error processing the request".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": error, "message": message }))).into_response()
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotGenerated(message) => ApiError::BadGateway {
                error: "failed to generate DAS document",
                message,
            },
            DocumentError::Serpro(SerproError::InvalidRequest(message)) => ApiError::BadRequest(message),
            DocumentError::Serpro(e @ (SerproError::Authentication(_) | SerproError::Configuration(_))) => {
                ApiError::BadGateway {
                    error: "SERPRO authentication failed",
                    message: e.to_string(),
                }
            }
            DocumentError::Requisition(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<RequisitionError> for ApiError {
    fn from(err: RequisitionError) -> Self {
        match err {
            RequisitionError::NotFound(id) => ApiError::NotFound(format!("requisition {id} not found")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::UserNotFound | AuthError::Token(_) => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}
