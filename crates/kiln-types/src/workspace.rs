//! Workspace records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A workspace: one synchronized file tree with a single owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Decimal string, strictly increasing, bumped by exactly one per
    /// successful confirm. `None` on records minted by older tooling that
    /// never synced; such records count as version 0.
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// New workspaces start at version "1".
    pub fn new(id: String, name: String, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            owner_id,
            version: Some("1".to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Workspace creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspace {
    pub name: String,
}
