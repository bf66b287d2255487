//! Manifest reader
//!
//! Read-only projection of a workspace's live tree with fresh short-lived
//! download URLs. Never mutates anything and tolerates a gateway outage by
//! listing entries without URLs.

use crate::storage::Database;
use kiln_core::ports::{BlobGateway, BlobOperation};
use kiln_core::{version, KilnError, ManifestEntry, ManifestResponse, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ManifestReader {
    db: Arc<Database>,
    gateway: Arc<dyn BlobGateway>,
    download_ttl: Duration,
}

impl ManifestReader {
    pub fn new(db: Arc<Database>, gateway: Arc<dyn BlobGateway>, download_ttl: Duration) -> Self {
        Self {
            db,
            gateway,
            download_ttl,
        }
    }

    pub async fn manifest(&self, workspace_id: &str) -> Result<ManifestResponse> {
        let workspace = self
            .db
            .get_workspace(workspace_id)
            .await?
            .ok_or_else(|| KilnError::WorkspaceNotFound(workspace_id.to_string()))?;
        let stored = version::stored(workspace.version.as_deref())?;

        let entries = self.db.list_file_entries(workspace_id).await?;
        debug!(
            "Reading manifest: workspace={}, entries={}",
            workspace_id,
            entries.len()
        );

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let download_url = match &entry.content_key {
                Some(key) => {
                    match self
                        .gateway
                        .presign(BlobOperation::Get, key, self.download_ttl)
                        .await
                    {
                        Ok(presigned) => Some(presigned.url),
                        Err(e) => {
                            warn!(
                                "Could not presign download for {}: {}",
                                entry.file_path, e
                            );
                            None
                        }
                    }
                }
                None => None,
            };

            files.push(ManifestEntry {
                file_path: entry.file_path,
                file_type: entry.file_type,
                file_id: entry.file_id,
                object_key: entry.content_key,
                size: entry.size,
                content_hash: entry.content_hash,
                download_url,
                updated_at: entry.updated_at,
            });
        }

        Ok(ManifestResponse {
            workspace_version: version::token(stored),
            files,
        })
    }
}
