//! Blob gateway backed by an external HTTP object store.
//!
//! Presigning is purely local (HMAC over the configured secret); only
//! deletes make an outbound request.

use crate::gateway::UrlSigner;
use async_trait::async_trait;
use chrono::Utc;
use kiln_core::ports::{BlobGateway, BlobOperation, PresignedUrl};
use kiln_core::{KilnError, Result};
use std::time::Duration;

/// Bounds every outbound call, so a hung store cannot stall the cleanup
/// that runs after a confirm.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpBlobGateway {
    base_url: String,
    signer: UrlSigner,
    client: reqwest::Client,
}

impl HttpBlobGateway {
    pub fn new(base_url: impl Into<String>, signing_secret: impl Into<Vec<u8>>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KilnError::Gateway(format!("http client: {e}")))?;
        Ok(Self {
            base_url,
            signer: UrlSigner::new(signing_secret),
            client,
        })
    }
}

#[async_trait]
impl BlobGateway for HttpBlobGateway {
    async fn presign(
        &self,
        operation: BlobOperation,
        key: &str,
        ttl: Duration,
    ) -> Result<PresignedUrl> {
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        let query = self.signer.signed_query(operation, key, expires_at.timestamp())?;
        Ok(PresignedUrl {
            url: format!("{}/{}?{}", self.base_url, key, query),
            expires_at,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let presigned = self
            .presign(BlobOperation::Delete, key, Duration::from_secs(60))
            .await?;

        let response = self
            .client
            .delete(&presigned.url)
            .send()
            .await
            .map_err(|e| KilnError::Gateway(format!("delete {key}: {e}")))?;

        // An already-gone object is a successful delete.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(KilnError::Gateway(format!(
                "delete {key} returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
