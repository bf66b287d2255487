//! Wire contract for the two sync phases and the manifest.
//!
//! Phase 1 (propose): the client reports per-path states and receives, per
//! path, the action it must take plus upload capability URLs. Phase 2
//! (confirm): the client echoes the staged actions together with the version
//! token and the server commits them atomically. Field names are camelCase
//! on the wire; the entry kind travels as the literal field `type`.

use crate::file::FileType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the client believes happened to a path since the last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    New,
    Modified,
    Deleted,
    Unchanged,
    /// Catch-all so an unrecognized wire string becomes a per-item error
    /// instead of failing the whole request.
    #[serde(other)]
    Unknown,
}

/// What the server asks the client to do for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionRequired {
    Upload,
    Delete,
    None,
}

/// Outcome classification shared by both phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    NoChanges,
    PendingConfirmation,
    WorkspaceConflict,
    Error,
}

/// Per-path input to phase 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFileState {
    pub file_path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_hash: Option<String>,
    pub action: ClientAction,
}

/// Body of `POST /workspaces/{id}/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// The version the client last saw; compared verbatim against the store.
    pub workspace_version: String,
    pub files: Vec<ClientFileState>,
}

/// Per-path output of phase 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAction {
    pub file_path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Object-store key; empty when no key applies (folders, absent paths).
    pub object_key: String,
    pub action_required: ActionRequired,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncAction {
    /// Nothing to do for this path.
    pub fn none(file_path: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            file_id: None,
            object_key: String::new(),
            action_required: ActionRequired::None,
            presigned_url: None,
            message: None,
        }
    }

    /// The client must transfer content before confirming the upsert.
    pub fn upload(
        file_path: impl Into<String>,
        file_type: FileType,
        file_id: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            file_id: Some(file_id.into()),
            object_key: object_key.into(),
            action_required: ActionRequired::Upload,
            presigned_url: None,
            message: None,
        }
    }

    /// The path is staged for deletion at confirm time.
    pub fn delete(
        file_path: impl Into<String>,
        file_type: FileType,
        file_id: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            file_id: Some(file_id.into()),
            object_key: object_key.into(),
            action_required: ActionRequired::Delete,
            presigned_url: None,
            message: None,
        }
    }

    pub fn with_entry(
        mut self,
        file_id: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        self.file_id = Some(file_id.into());
        self.object_key = object_key.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.presigned_url = Some(url.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Response of `POST /workspaces/{id}/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub status: SyncStatus,
    pub actions: Vec<SyncAction>,
    /// Offered only with `pending_confirmation`; never persisted by phase 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_workspace_version: Option<String>,
    /// Authoritative stored version, so clients can reconcile after a
    /// conflict without another round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_workspace_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SyncResponse {
    pub fn conflict(current_version: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::WorkspaceConflict,
            actions: Vec::new(),
            new_workspace_version: None,
            current_workspace_version: Some(current_version.into()),
            error_message: Some(message.into()),
        }
    }

    pub fn no_changes(actions: Vec<SyncAction>, current_version: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::NoChanges,
            actions,
            new_workspace_version: None,
            current_workspace_version: Some(current_version.into()),
            error_message: None,
        }
    }

    pub fn pending(
        actions: Vec<SyncAction>,
        next_version: impl Into<String>,
        current_version: impl Into<String>,
    ) -> Self {
        Self {
            status: SyncStatus::PendingConfirmation,
            actions,
            new_workspace_version: Some(next_version.into()),
            current_workspace_version: Some(current_version.into()),
            error_message: None,
        }
    }
}

/// Metadata mutation applied by phase 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileActionKind {
    Upsert,
    Delete,
}

/// Per-path input to phase 2, echoed from the phase-1 actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAction {
    pub file_path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub file_id: String,
    #[serde(default)]
    pub object_key: String,
    pub action: FileActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

/// Body of `POST /workspaces/{id}/sync/confirm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    /// The version token offered by phase 1: stored version + 1.
    pub workspace_version: String,
    pub sync_actions: Vec<FileAction>,
}

/// Response of `POST /workspaces/{id}/sync/confirm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_workspace_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_workspace_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConfirmResponse {
    pub fn success(final_version: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Success,
            final_workspace_version: Some(final_version.into()),
            current_workspace_version: None,
            error_message: None,
        }
    }

    /// Version-mismatch rejection; nothing was written.
    pub fn conflict(current_version: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            final_workspace_version: None,
            current_workspace_version: Some(current_version.into()),
            error_message: Some(message.into()),
        }
    }
}

/// One live entry in the manifest projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub file_path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Fresh short-lived GET URL; absent for folders and when the gateway
    /// declined to sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Response of `GET /workspaces/{id}/manifest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResponse {
    pub workspace_version: String,
    pub files: Vec<ManifestEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names_match_contract() {
        let action = SyncAction::upload("src/main.py", FileType::File, "f-1", "workspaces/w/blobs/f-1")
            .with_url("https://blobs/x");
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["filePath"], "src/main.py");
        assert_eq!(value["type"], "file");
        assert_eq!(value["fileId"], "f-1");
        assert_eq!(value["objectKey"], "workspaces/w/blobs/f-1");
        assert_eq!(value["actionRequired"], "upload");
        assert_eq!(value["presignedUrl"], "https://blobs/x");
        assert!(value.get("message").is_none());
    }

    #[test]
    fn status_strings_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::PendingConfirmation).unwrap(),
            "\"pending_confirmation\""
        );
        assert_eq!(
            serde_json::to_string(&SyncStatus::WorkspaceConflict).unwrap(),
            "\"workspace_conflict\""
        );
    }

    #[test]
    fn unknown_client_action_deserializes() {
        let state: ClientFileState = serde_json::from_str(
            r#"{"filePath":"a.py","type":"file","action":"renamed"}"#,
        )
        .unwrap();
        assert_eq!(state.action, ClientAction::Unknown);
    }

    #[test]
    fn confirm_request_parses_wire_shape() {
        let request: ConfirmRequest = serde_json::from_str(
            r#"{
                "workspaceVersion": "2",
                "syncActions": [{
                    "filePath": "a.py",
                    "type": "file",
                    "fileId": "f-1",
                    "objectKey": "workspaces/w/blobs/f-1",
                    "action": "upsert",
                    "clientHash": "abc",
                    "size": 12
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(request.workspace_version, "2");
        assert_eq!(request.sync_actions[0].action, FileActionKind::Upsert);
        assert_eq!(request.sync_actions[0].size, Some(12));
    }
}
