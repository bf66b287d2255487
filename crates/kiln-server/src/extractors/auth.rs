//! Auth extractor for protected routes

use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Authenticated caller, extracted from the `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
}

/// Auth error response
pub struct AuthError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "errorMessage": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AuthError {
                status: StatusCode::UNAUTHORIZED,
                message: "Missing Authorization header".to_string(),
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| AuthError {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid Authorization format".to_string(),
        })?;

        match state.auth_service.validate_token(token).await {
            Ok(user_id) => Ok(AuthUser { user_id }),
            Err(e) => Err(AuthError {
                status: StatusCode::UNAUTHORIZED,
                message: format!("Invalid token: {e}"),
            }),
        }
    }
}
