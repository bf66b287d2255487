//! In-memory blob gateway using DashMap (standalone mode and tests).
//!
//! Issues the same URL shape as the HTTP gateway under a `memory://` base
//! and records deletes instead of performing them, so tests can observe
//! post-commit cleanup.

use crate::gateway::UrlSigner;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use kiln_core::ports::{BlobGateway, BlobOperation, PresignedUrl};
use kiln_core::Result;
use std::time::Duration;

pub struct MemoryBlobGateway {
    signer: UrlSigner,
    deleted: DashMap<String, usize>,
}

impl MemoryBlobGateway {
    pub fn new() -> Self {
        Self {
            signer: UrlSigner::new(b"memory-blob-gateway".to_vec()),
            deleted: DashMap::new(),
        }
    }

    pub fn was_deleted(&self, key: &str) -> bool {
        self.deleted.contains_key(key)
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for MemoryBlobGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobGateway for MemoryBlobGateway {
    async fn presign(
        &self,
        operation: BlobOperation,
        key: &str,
        ttl: Duration,
    ) -> Result<PresignedUrl> {
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        let query = self.signer.signed_query(operation, key, expires_at.timestamp())?;
        Ok(PresignedUrl {
            url: format!("memory://blobs/{key}?{query}"),
            expires_at,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        *self.deleted.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
