use bcrypt::{DEFAULT_COST, hash, verify};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::user::User;
use crate::services::jwt_service::JwtService;

#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    jwt_service: JwtService,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("user not found")]
    UserNotFound,
}

impl AuthService {
    pub fn new(pool: SqlitePool, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    /// Checks the password and issues a session token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user = User::find_by_username(&self.pool, username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify(password, &user.password_hash)? {
            warn!("Rejected login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt_service.create_access_token(&user.username)?;
        info!(user_id = user.id, "Staff user logged in");
        Ok(token)
    }

    pub async fn verify_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.jwt_service.verify_access_token(token)?;

        User::find_by_username(&self.pool, &claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Creates or resets a staff account.
    #[instrument(skip(self, password))]
    pub async fn upsert_user(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let password_hash = hash(password, DEFAULT_COST)?;
        let user = User::upsert(&self.pool, username, &password_hash).await?;
        info!(user_id = user.id, "Staff user provisioned");
        Ok(user)
    }
}
