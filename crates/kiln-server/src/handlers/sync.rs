//! Sync protocol handlers (propose and confirm)
//!
//! Version conflicts are not error envelopes here: both phases answer 409
//! with a full protocol body carrying the authoritative version, so clients
//! can reconcile without another round trip.

use crate::extractors::AuthUser;
use crate::handlers::{error::ApiError, require_member};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kiln_core::{ConfirmRequest, ConfirmResponse, KilnError, SyncRequest, SyncResponse};
use tracing::info;

pub async fn sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
    Json(request): Json<SyncRequest>,
) -> Result<Response, ApiError> {
    require_member(&state, &id, &user.user_id).await?;

    match state.planner.plan(&id, &request).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(KilnError::VersionConflict { submitted, current }) => {
            info!(
                "Sync version conflict: workspace={}, submitted={}, current={}",
                id, submitted, current
            );
            let body = SyncResponse::conflict(
                current.clone(),
                format!("Workspace version conflict: submitted {submitted}, current {current}"),
            );
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        Err(e) => Err(ApiError::from(e)),
    }
}

pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
    Json(request): Json<ConfirmRequest>,
) -> Result<Response, ApiError> {
    require_member(&state, &id, &user.user_id).await?;

    match state.committer.confirm(&id, &request).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(KilnError::VersionConflict { submitted, current }) => {
            info!(
                "Confirm version conflict: workspace={}, submitted={}, current={}",
                id, submitted, current
            );
            let body = ConfirmResponse::conflict(
                current.clone(),
                format!("Workspace version conflict: submitted {submitted}, current {current}"),
            );
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        Err(e) => Err(ApiError::from(e)),
    }
}
