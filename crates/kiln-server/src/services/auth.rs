//! Token validation service
//!
//! Identity issuance lives with the external identity collaborator; this
//! service only validates bearer tokens and extracts the caller id.
//! `issue_token` exists for standalone deployments and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Mints a bearer token for a caller id, valid for 30 days.
    pub fn issue_token(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + Duration::days(30)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| KilnError::AuthenticationFailed(e.to_string()))
    }

    /// Returns the caller id encoded in a valid token.
    pub async fn validate_token(&self, token: &str) -> Result<String> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| KilnError::AuthenticationFailed(e.to_string()))?;

        Ok(token_data.claims.sub)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // caller id
    exp: i64,    // expiration time
    iat: i64,    // issued at
}
