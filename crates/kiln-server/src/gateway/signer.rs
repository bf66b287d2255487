//! Capability URL signing.
//!
//! A presigned URL carries `op`, `exp` (unix seconds) and `sig` in its
//! query string; the signature is HMAC-SHA256 over operation, object key
//! and expiry, hex-encoded. Whoever holds the signing secret can verify a
//! URL without any further state.

use hmac::{Hmac, Mac};
use kiln_core::ports::BlobOperation;
use kiln_core::{KilnError, Result};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Builds the signed query string for one operation on one key.
    pub fn signed_query(
        &self,
        operation: BlobOperation,
        key: &str,
        expires_at: i64,
    ) -> Result<String> {
        let sig = self.sign(operation, key, expires_at)?;
        Ok(format!("op={}&exp={}&sig={}", operation.as_str(), expires_at, sig))
    }

    /// Checks signature and expiry of query parameters produced by
    /// [`UrlSigner::signed_query`].
    pub fn verify(
        &self,
        operation: BlobOperation,
        key: &str,
        expires_at: i64,
        sig: &str,
        now: i64,
    ) -> Result<()> {
        let expected = self.sign(operation, key, expires_at)?;
        if expected != sig {
            return Err(KilnError::Gateway("invalid signature".to_string()));
        }
        if now > expires_at {
            return Err(KilnError::Gateway("capability URL expired".to_string()));
        }
        Ok(())
    }

    fn sign(&self, operation: BlobOperation, key: &str, expires_at: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| KilnError::Gateway(format!("invalid signing secret: {e}")))?;
        mac.update(operation.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires_at.to_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
