//! Workspace membership backed by the version store.
//!
//! The stored projection of membership is ownership: a caller may touch a
//! workspace iff they own the record.

use crate::storage::Database;
use async_trait::async_trait;
use kiln_core::ports::MembershipPort;
use kiln_core::{KilnError, Result};
use std::sync::Arc;

pub struct StoreMembership {
    db: Arc<Database>,
}

impl StoreMembership {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MembershipPort for StoreMembership {
    async fn is_member(&self, workspace_id: &str, caller_id: &str) -> Result<bool> {
        match self.db.get_workspace(workspace_id).await? {
            None => Err(KilnError::WorkspaceNotFound(workspace_id.to_string())),
            Some(workspace) => Ok(workspace.owner_id == caller_id),
        }
    }
}
