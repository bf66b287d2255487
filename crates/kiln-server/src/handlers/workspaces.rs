//! Workspace handlers

use crate::extractors::AuthUser;
use crate::handlers::{error::ApiError, require_member};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use kiln_core::{CreateWorkspace, KilnError, ManifestResponse, Workspace};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    workspace: Workspace,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req_body): Json<CreateWorkspace>,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    let name = req_body.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Workspace name must not be empty",
        ));
    }

    let workspace = Workspace::new(
        uuid::Uuid::new_v4().to_string(),
        name.to_string(),
        user.user_id,
    );
    state.db.create_workspace(&workspace).await?;

    info!(
        "Workspace created: id={}, owner={}",
        workspace.id, workspace.owner_id
    );
    Ok(Json(WorkspaceResponse { workspace }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<Json<WorkspaceResponse>, ApiError> {
    require_member(&state, &id, &user.user_id).await?;

    match state.db.get_workspace(&id).await? {
        Some(workspace) => Ok(Json(WorkspaceResponse { workspace })),
        None => Err(ApiError::from(KilnError::WorkspaceNotFound(id))),
    }
}

pub async fn manifest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<Json<ManifestResponse>, ApiError> {
    require_member(&state, &id, &user.user_id).await?;

    let manifest = state.manifest.manifest(&id).await?;
    Ok(Json(manifest))
}
