//! Workspace membership port.
//!
//! Identity issuance lives outside this system; the sync core only asks
//! whether an authenticated caller may touch a workspace.

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MembershipPort: Send + Sync {
    /// Returns `Ok(true)` when `caller_id` may read and mutate the
    /// workspace. Unknown workspaces are an error, not `Ok(false)`, so
    /// handlers can distinguish 404 from 403.
    async fn is_member(&self, workspace_id: &str, caller_id: &str) -> Result<bool>;
}
