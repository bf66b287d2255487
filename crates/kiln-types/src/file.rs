//! File tree entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Folder,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::File => write!(f, "file"),
            FileType::Folder => write!(f, "folder"),
        }
    }
}

/// One live path in a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Stable opaque id; survives content changes, replaced only when the
    /// path is deleted and created again.
    pub file_id: String,
    pub file_path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Object-store key holding the content; `None` for folders.
    pub content_key: Option<String>,
    pub size: i64,
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileEntry {
    pub fn is_folder(&self) -> bool {
        self.file_type == FileType::Folder
    }
}
