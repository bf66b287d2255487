//! Confirm committer (commit phase)
//!
//! Takes the actions the client staged and performed, normalizes them into
//! entry changes, and lands them in one version-guarded transaction. The
//! only durable mutation in the whole protocol happens here.

use crate::storage::{Database, EntryChange, UpsertEntry};
use kiln_core::ports::BlobGateway;
use kiln_core::{
    path, version, ConfirmRequest, ConfirmResponse, FileAction, FileActionKind, FileType,
    KilnError, Result,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ConfirmCommitter {
    db: Arc<Database>,
    gateway: Arc<dyn BlobGateway>,
}

impl ConfirmCommitter {
    pub fn new(db: Arc<Database>, gateway: Arc<dyn BlobGateway>) -> Self {
        Self { db, gateway }
    }

    pub async fn confirm(
        &self,
        workspace_id: &str,
        request: &ConfirmRequest,
    ) -> Result<ConfirmResponse> {
        let submitted = version::parse(&request.workspace_version)?;
        let changes = build_changes(workspace_id, &request.sync_actions)?;

        let receipt = self.db.commit_sync(workspace_id, submitted, &changes).await?;

        info!(
            "Confirm committed: workspace={}, version={}, changes={}",
            workspace_id,
            receipt.final_version,
            changes.len()
        );

        // The metadata is committed; stray blobs are inert, so cleanup is
        // best-effort and never surfaces to the caller.
        let deletions = receipt.orphaned_keys.iter().map(|key| async move {
            if let Err(e) = self.gateway.delete(key).await {
                warn!("Blob cleanup failed for {}: {}", key, e);
            }
        });
        futures::future::join_all(deletions).await;

        Ok(ConfirmResponse::success(receipt.final_version))
    }
}

fn build_changes(workspace_id: &str, actions: &[FileAction]) -> Result<Vec<EntryChange>> {
    let mut seen = HashSet::new();
    let mut changes = Vec::with_capacity(actions.len());

    for action in actions {
        if action.file_path.is_empty() {
            return Err(KilnError::Validation("empty filePath".to_string()));
        }
        if !seen.insert(action.file_path.as_str()) {
            return Err(KilnError::Validation(format!(
                "duplicate filePath: {}",
                action.file_path
            )));
        }

        let entry_key = path::entry_key(&action.file_path);
        match action.action {
            FileActionKind::Delete => changes.push(EntryChange::Delete { entry_key }),
            FileActionKind::Upsert => {
                if action.file_id.is_empty() {
                    return Err(KilnError::Validation(format!(
                        "missing fileId for {}",
                        action.file_path
                    )));
                }
                // Folders never carry content, whatever the client sent.
                let entry = if action.file_type == FileType::Folder {
                    UpsertEntry {
                        entry_key,
                        file_id: action.file_id.clone(),
                        file_path: action.file_path.clone(),
                        file_type: FileType::Folder,
                        content_key: None,
                        size: 0,
                        content_hash: None,
                    }
                } else {
                    let content_key = if action.object_key.is_empty() {
                        path::content_key(workspace_id, &action.file_id)
                    } else {
                        action.object_key.clone()
                    };
                    UpsertEntry {
                        entry_key,
                        file_id: action.file_id.clone(),
                        file_path: action.file_path.clone(),
                        file_type: FileType::File,
                        content_key: Some(content_key),
                        size: action.size.unwrap_or(0),
                        content_hash: action.client_hash.clone(),
                    }
                };
                changes.push(EntryChange::Upsert(entry));
            }
        }
    }

    Ok(changes)
}
