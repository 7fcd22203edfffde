use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// Claims of a staff session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,        // username
    pub exp: i64,           // expiration time
    pub iat: i64,           // issued at
    pub token_type: String, // "access"
}

impl AccessClaims {
    pub fn new(username: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = now + ttl;

        Self {
            sub: username.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        }
    }
}
