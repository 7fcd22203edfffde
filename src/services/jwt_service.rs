use chrono::Duration;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error as JwtError,
    errors::ErrorKind,
};
use tracing::instrument;

use crate::models::jwt::AccessClaims;

/// Lifetime of a staff session.
pub const ACCESS_TOKEN_TTL_HOURS: i64 = 8;

#[derive(Clone)]
pub struct JwtService {
    enc_key: EncodingKey,
    dec_key: DecodingKey,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret_key: &str) -> Self {
        Self {
            enc_key: EncodingKey::from_secret(secret_key.as_bytes()),
            dec_key: DecodingKey::from_secret(secret_key.as_bytes()),
            ttl: Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        }
    }

    #[instrument(skip(self))]
    pub fn create_access_token(&self, username: &str) -> Result<String, JwtError> {
        self.create_jwt(&AccessClaims::new(username, self.ttl))
    }

    /// Validate an access token and return its claims.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims = self.decode_jwt::<AccessClaims>(token)?;
        if claims.token_type != "access" {
            return Err(ErrorKind::InvalidToken.into());
        }
        Ok(claims)
    }

    fn create_jwt<T: serde::Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        encode(&Header::default(), claims, &self.enc_key)
    }

    fn decode_jwt<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        decode::<T>(token, &self.dec_key, &validation).map(|data| data.claims)
    }
}
