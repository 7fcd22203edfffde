use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use super::credentials::Credentials;
use super::error::SerproError;
use super::http::HttpClient;

const ROLE_TYPE: &str = "TERCEIROS";
const EXPIRY_MARGIN_SECS: i64 = 30;
/// Upper bound accepted for `expires_in` (one year).
const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 60 * 60;

/// Source of the current time, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub jwt_token: String,
}

/// Last tokens handed out by the authentication endpoint.
#[derive(Debug, Clone)]
pub struct TokenCache {
    pub tokens: TokenPair,
    pub expires_in: i64,
    pub issued_at: DateTime<Utc>,
}

impl TokenCache {
    /// Valid while `now - issued_at < expires_in - 30s`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        Duration::try_seconds(self.expires_in.saturating_sub(EXPIRY_MARGIN_SECS))
            .is_some_and(|lifetime| now - self.issued_at < lifetime)
    }
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
    jwt_token: String,
    expires_in: i64,
}

/// Obtains and caches the bearer/JWT token pair.
///
/// The cache lock is held across the refresh call, so concurrent callers wait
/// for a single authentication round-trip instead of racing their own.
pub struct TokenManager {
    http: HttpClient,
    auth_url: String,
    authorization: String,
    cache: Mutex<Option<TokenCache>>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(http: HttpClient, auth_url: impl Into<String>, credentials: &Credentials) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
            authorization: credentials.basic_authorization(),
            cache: Mutex::new(None),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(skip(self))]
    pub async fn get_tokens(&self) -> Result<TokenPair, SerproError> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now();

        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid_at(now)) {
            info!("Using cached SERPRO token");
            return Ok(cached.tokens.clone());
        }

        let fresh = self.authenticate().await?;
        let tokens = TokenPair {
            access_token: fresh.access_token,
            jwt_token: fresh.jwt_token,
        };
        *cache = Some(TokenCache {
            tokens: tokens.clone(),
            expires_in: fresh.expires_in,
            issued_at: now,
        });

        info!(expires_in = fresh.expires_in, "SERPRO token obtained");
        Ok(tokens)
    }

    async fn authenticate(&self) -> Result<AuthResponse, SerproError> {
        let request = self
            .http
            .request(Method::POST, &self.auth_url)
            .header(AUTHORIZATION, &self.authorization)
            .header("Role-Type", ROLE_TYPE)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&[("grant_type", "client_credentials")]);

        let response = self.http.send(request).await.map_err(|e| {
            error!(error = %e, "Authentication request failed");
            SerproError::Authentication(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Authentication rejected");
            return Err(SerproError::Authentication(format!("HTTP {status}: {body}")));
        }

        let auth = response.json::<AuthResponse>().await.map_err(|e| {
            error!(error = %e, "Malformed authentication response");
            SerproError::Authentication(format!("malformed response: {e}"))
        })?;

        if !(1..=MAX_EXPIRES_IN_SECS).contains(&auth.expires_in) {
            error!(expires_in = auth.expires_in, "Authentication response has an unusable lifetime");
            return Err(SerproError::Authentication(format!(
                "expires_in out of range: {}",
                auth.expires_in
            )));
        }

        Ok(auth)
    }

    #[cfg(test)]
    pub async fn cached(&self) -> Option<TokenCache> {
        self.cache.lock().await.clone()
    }
}

/// Manually advanced clock for tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<std::sync::Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(std::sync::Mutex::new(Utc::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
