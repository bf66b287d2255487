//! Blob store gateway port.
//!
//! The server never proxies file bytes; it only hands out time-limited
//! capability URLs against an external content store and issues best-effort
//! deletes. Nothing here checks that an object exists; correctness never
//! depends on it.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOperation {
    Put,
    Get,
    Delete,
}

impl BlobOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobOperation::Put => "put",
            BlobOperation::Get => "get",
            BlobOperation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for BlobOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A signed, time-limited URL authorizing one operation on one object key.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues capability URLs and deletes objects.
#[async_trait]
pub trait BlobGateway: Send + Sync {
    async fn presign(
        &self,
        operation: BlobOperation,
        key: &str,
        ttl: Duration,
    ) -> Result<PresignedUrl>;

    /// Best-effort removal; callers log failures and move on.
    async fn delete(&self, key: &str) -> Result<()>;
}
