//! HTTP handlers

pub mod error;
pub mod health;
pub mod sync;
pub mod workspaces;

pub use health::health;

use crate::handlers::error::ApiError;
use crate::AppState;

/// Runs the membership gate shared by every workspace-scoped route. An
/// unknown workspace surfaces as 404 through the error mapping; a known
/// workspace with a foreign caller becomes 403.
pub(crate) async fn require_member(
    state: &AppState,
    workspace_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    match state.membership.is_member(workspace_id, user_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::forbidden()),
        Err(e) => Err(ApiError::from(e)),
    }
}
