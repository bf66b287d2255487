//! HTTP mapping of domain errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kiln_core::KilnError;
use serde_json::json;

/// Error envelope returned by every non-sync endpoint (the sync endpoints
/// build their richer conflict bodies themselves).
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Not a member of this workspace")
    }
}

impl From<KilnError> for ApiError {
    fn from(e: KilnError) -> Self {
        match e {
            KilnError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            KilnError::AuthenticationFailed(msg) => Self::new(StatusCode::UNAUTHORIZED, msg),
            KilnError::Authorization(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            KilnError::WorkspaceNotFound(id) => {
                Self::new(StatusCode::NOT_FOUND, format!("Workspace not found: {id}"))
            }
            KilnError::FileNotFound(p) => {
                Self::new(StatusCode::NOT_FOUND, format!("File not found: {p}"))
            }
            KilnError::VersionConflict { .. } => Self::new(StatusCode::CONFLICT, e.to_string()),
            other => {
                tracing::error!("Internal error: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "errorMessage": self.message,
        }));
        (self.status, body).into_response()
    }
}
