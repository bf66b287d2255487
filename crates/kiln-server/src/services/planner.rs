//! Sync planner (propose phase)
//!
//! Diffs client-reported file states against stored metadata and answers,
//! per path, what the client must do before confirming. Performs no durable
//! writes: an abandoned plan costs nothing and expires with its URLs.

use crate::storage::Database;
use kiln_core::ports::{BlobGateway, BlobOperation};
use kiln_core::{
    path, version, ActionRequired, ClientAction, ClientFileState, FileEntry, FileType, KilnError,
    Result, SyncAction, SyncRequest, SyncResponse,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SyncPlanner {
    db: Arc<Database>,
    gateway: Arc<dyn BlobGateway>,
    upload_ttl: Duration,
}

impl SyncPlanner {
    pub fn new(db: Arc<Database>, gateway: Arc<dyn BlobGateway>, upload_ttl: Duration) -> Self {
        Self {
            db,
            gateway,
            upload_ttl,
        }
    }

    pub async fn plan(&self, workspace_id: &str, request: &SyncRequest) -> Result<SyncResponse> {
        let submitted = version::parse(&request.workspace_version)?;
        validate_paths(&request.files)?;

        let workspace = self
            .db
            .get_workspace(workspace_id)
            .await?
            .ok_or_else(|| KilnError::WorkspaceNotFound(workspace_id.to_string()))?;
        let stored = version::stored(workspace.version.as_deref())?;

        // The client must be current before anything is staged.
        if submitted != stored {
            return Err(KilnError::VersionConflict {
                submitted: version::token(submitted),
                current: version::token(stored),
            });
        }
        let next_version = stored.saturating_add(1);

        info!(
            "Planning sync: workspace={}, version={}, files={}",
            workspace_id,
            stored,
            request.files.len()
        );

        let entries = self.db.list_file_entries(workspace_id).await?;
        let by_path: HashMap<&str, &FileEntry> =
            entries.iter().map(|e| (e.file_path.as_str(), e)).collect();

        let mut actions = Vec::with_capacity(request.files.len());
        for state in &request.files {
            let existing = by_path.get(state.file_path.as_str()).copied();
            let action = match self.plan_file(workspace_id, next_version, state, existing).await {
                Ok(action) => action,
                // A gateway hiccup degrades this file only; the batch
                // continues because nothing has been written yet.
                Err(e) => {
                    warn!("Planning failed for {}: {}", state.file_path, e);
                    SyncAction::none(state.file_path.as_str(), state.file_type)
                        .with_message(format!("unable to plan this file: {e}"))
                }
            };
            actions.push(action);
        }

        if actions
            .iter()
            .all(|a| a.action_required == ActionRequired::None)
        {
            debug!("Nothing to sync for workspace {}", workspace_id);
            return Ok(SyncResponse::no_changes(actions, version::token(stored)));
        }

        Ok(SyncResponse::pending(
            actions,
            version::token(next_version),
            version::token(stored),
        ))
    }

    async fn plan_file(
        &self,
        workspace_id: &str,
        next_version: u64,
        state: &ClientFileState,
        existing: Option<&FileEntry>,
    ) -> Result<SyncAction> {
        match state.action {
            ClientAction::New | ClientAction::Modified => {
                self.plan_write(workspace_id, next_version, state, existing).await
            }
            ClientAction::Deleted => Ok(plan_delete(state, existing)),
            ClientAction::Unchanged => Ok(carry_over(state, existing)),
            ClientAction::Unknown => Ok(SyncAction::none(
                state.file_path.as_str(),
                state.file_type,
            )
            .with_message("unrecognized client action")),
        }
    }

    async fn plan_write(
        &self,
        workspace_id: &str,
        next_version: u64,
        state: &ClientFileState,
        existing: Option<&FileEntry>,
    ) -> Result<SyncAction> {
        let transfer_needed = match (state.action, existing) {
            // `new` always re-stages, even over an existing entry.
            (ClientAction::New, _) => true,
            (_, None) => true,
            (_, Some(entry)) => !hashes_match(
                state.client_hash.as_deref(),
                entry.content_hash.as_deref(),
                state.file_type,
            ),
        };
        if !transfer_needed {
            return Ok(carry_over(state, existing));
        }

        // Identity for a fresh path is derived from the plan inputs, so
        // replanning the same change offers the same id and object key.
        let file_id = existing
            .map(|e| e.file_id.clone())
            .unwrap_or_else(|| path::file_id(workspace_id, &state.file_path, next_version));

        if state.file_type == FileType::Folder {
            // Metadata-only: staged for commit, nothing to transfer, so no
            // URL is issued.
            return Ok(SyncAction::upload(
                state.file_path.as_str(),
                state.file_type,
                file_id,
                String::new(),
            ));
        }

        let object_key = existing
            .and_then(|e| e.content_key.clone())
            .unwrap_or_else(|| path::content_key(workspace_id, &file_id));
        let presigned = self
            .gateway
            .presign(BlobOperation::Put, &object_key, self.upload_ttl)
            .await?;

        Ok(SyncAction::upload(
            state.file_path.as_str(),
            state.file_type,
            file_id,
            object_key,
        )
        .with_url(presigned.url))
    }
}

fn validate_paths(files: &[ClientFileState]) -> Result<()> {
    let mut seen = HashSet::new();
    for state in files {
        if state.file_path.is_empty() {
            return Err(KilnError::Validation("empty filePath".to_string()));
        }
        if !seen.insert(state.file_path.as_str()) {
            return Err(KilnError::Validation(format!(
                "duplicate filePath: {}",
                state.file_path
            )));
        }
    }
    Ok(())
}

/// Content equality is only provable when both sides carry a hash; folders
/// have no content to compare.
fn hashes_match(client: Option<&str>, stored: Option<&str>, file_type: FileType) -> bool {
    if file_type == FileType::Folder {
        return true;
    }
    match (client, stored) {
        (Some(c), Some(s)) => c == s,
        _ => false,
    }
}

fn plan_delete(state: &ClientFileState, existing: Option<&FileEntry>) -> SyncAction {
    match existing {
        Some(entry) => SyncAction::delete(
            state.file_path.as_str(),
            entry.file_type,
            entry.file_id.clone(),
            entry.content_key.clone().unwrap_or_default(),
        ),
        // Deleting what is not there is already done.
        None => SyncAction::none(state.file_path.as_str(), state.file_type),
    }
}

fn carry_over(state: &ClientFileState, existing: Option<&FileEntry>) -> SyncAction {
    match existing {
        Some(entry) => SyncAction::none(state.file_path.as_str(), entry.file_type).with_entry(
            entry.file_id.clone(),
            entry.content_key.clone().unwrap_or_default(),
        ),
        None => SyncAction::none(state.file_path.as_str(), state.file_type),
    }
}
