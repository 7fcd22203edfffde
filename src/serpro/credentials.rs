use std::fmt;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Identity;
use tracing::{error, info, instrument};

use super::error::SerproError;

/// Client certificate and API consumer credentials.
#[derive(Clone)]
pub struct Credentials {
    pub certificate_dir: String,
    pub certificate_name: String,
    pub certificate_password: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("certificate_dir", &self.certificate_dir)
            .field("certificate_name", &self.certificate_name)
            .field("certificate_password", &"***")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn certificate_path(&self) -> PathBuf {
        PathBuf::from(&self.certificate_dir).join(&self.certificate_name)
    }

    /// `Basic base64(consumer_key:consumer_secret)`
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.consumer_key, self.consumer_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }

    /// Reads the PKCS#12 bundle used for mutual TLS with the authentication endpoint.
    #[instrument(skip(self), fields(path = %self.certificate_path().display()))]
    pub fn load_identity(&self) -> Result<Identity, SerproError> {
        let path = self.certificate_path();
        let der = std::fs::read(&path).map_err(|e| {
            error!(error = %e, "Failed to read client certificate");
            SerproError::Configuration(format!("cannot read certificate {}: {e}", path.display()))
        })?;

        let identity = Identity::from_pkcs12_der(&der, &self.certificate_password).map_err(|e| {
            error!(error = %e, "Failed to parse client certificate");
            SerproError::Configuration(format!("invalid certificate or password: {e}"))
        })?;

        info!("Client certificate loaded");
        Ok(identity)
    }
}
