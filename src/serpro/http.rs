use std::time::Duration;

use reqwest::{Client, Identity, IntoUrl, Method, RequestBuilder, Response};
use tracing::{debug, warn};

/// Thin wrapper over reqwest with a request timeout and bounded retries for
/// transient transport failures. HTTP error statuses are returned as-is.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, reqwest::Error> {
        let request = builder.build()?;
        let idempotent = request.method().is_idempotent();
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            // Streaming bodies cannot be replayed; those get a single shot.
            let Some(current) = request.try_clone() else {
                return self.client.execute(request).await;
            };

            match self.client.execute(current).await {
                Ok(response) => {
                    debug!(attempt, status = %response.status(), "received HTTP response");
                    return Ok(response);
                }
                Err(err) if attempt < attempts && is_retryable(&err, idempotent) => {
                    warn!(attempt, error = %err, "transient HTTP failure, retrying");
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1u32 << shift)
    }
}

/// A request that never connected can always be replayed. A timed-out one may
/// already have reached the server, so only idempotent methods retry it.
fn is_retryable(err: &reqwest::Error, idempotent: bool) -> bool {
    err.is_connect() || (idempotent && err.is_timeout())
}

pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    identity: Option<Identity>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            base_backoff: Duration::from_millis(200),
            identity: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total number of attempts, initial try included.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Client certificate presented during the TLS handshake.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(identity) = self.identity {
            builder = builder.use_native_tls().identity(identity);
        }

        Ok(HttpClient {
            client: builder.build()?,
            max_attempts: self.max_attempts,
            base_backoff: self.base_backoff,
        })
    }
}
