use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerproError {
    /// Certificate or credentials could not be loaded.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The authentication endpoint failed or rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("invalid document request: {0}")]
    InvalidRequest(String),
}
