use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use dotenv::dotenv;
use thiserror::Error;

use crate::serpro::credentials::Credentials;
use crate::utils::taxpayer::digits_only;

const DEFAULT_DATABASE_URL: &str = "sqlite:serpro_app.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_AUTH_URL: &str = "https://autenticacao.sapi.serpro.gov.br/authenticate";
const DEFAULT_BASE_URL: &str = "https://gateway.apiserpro.serpro.gov.br/integra-contador/v1";
const PLACEHOLDER_CNPJ: &str = "00000000000000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_COMPANY_CODE: &str = "0000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings for talking to the SERPRO gateway.
#[derive(Debug, Clone)]
pub struct SerproConfig {
    pub credentials: Credentials,
    pub auth_url: String,
    pub base_url: String,
    pub contractor_id: String,
    pub requester_id: String,
    pub timeout: Duration,
    pub max_attempts: usize,
}

/// Bootstrap account created at startup when both variables are present.
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Maps a taxpayer's CNPJ to the internal company code used in receipt file names.
#[derive(Debug, Clone, Default)]
pub struct CompanyCodes {
    codes: HashMap<String, String>,
}

impl CompanyCodes {
    /// Parses `cnpj=code;cnpj=code`. Keys are compared by their digits only.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut codes = HashMap::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (cnpj, code) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
                name: "CODIGOS_EMPRESA",
                reason: format!("expected cnpj=code, got '{entry}'"),
            })?;
            codes.insert(digits_only(cnpj), code.trim().to_string());
        }
        Ok(Self { codes })
    }

    pub fn code_for(&self, taxpayer_id: &str) -> &str {
        self.codes
            .get(&digits_only(taxpayer_id))
            .map(String::as_str)
            .unwrap_or(DEFAULT_COMPANY_CODE)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub secret_key: String,
    pub serpro: SerproConfig,
    pub company_codes: CompanyCodes,
    pub admin: Option<AdminSeed>,
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let credentials = Credentials {
            certificate_dir: required("CAMINHO_CERTIFICADO")?,
            certificate_name: required("NOME_CERTIFICADO")?,
            certificate_password: required("SENHA_CERTIFICADO")?,
            consumer_key: required("CONSUMER_KEY")?,
            consumer_secret: required("CONSUMER_SECRET")?,
        };
        let secret_key = required("SECRET_KEY")?;

        let bind_addr = optional("BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let timeout_secs = parse_number::<u64>("SERPRO_TIMEOUT_SECS", lookup("SERPRO_TIMEOUT_SECS"))?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let max_attempts = parse_number::<usize>("SERPRO_MAX_ATTEMPTS", lookup("SERPRO_MAX_ATTEMPTS"))?
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let serpro = SerproConfig {
            credentials,
            auth_url: optional("SERPRO_AUTH_URL", DEFAULT_AUTH_URL),
            base_url: optional("SERPRO_BASE_URL", DEFAULT_BASE_URL),
            contractor_id: optional("CNPJ_CONTRATANTE", PLACEHOLDER_CNPJ),
            requester_id: optional("CNPJ_AUTOR_PEDIDO", PLACEHOLDER_CNPJ),
            timeout: Duration::from_secs(timeout_secs),
            max_attempts: max_attempts.max(1),
        };

        let company_codes = CompanyCodes::parse(&optional("CODIGOS_EMPRESA", ""))?;

        let admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_USERNAME")),
        };

        Ok(Self {
            bind_addr,
            database_url: optional("DATABASE_URL", DEFAULT_DATABASE_URL),
            secret_key,
            serpro,
            company_codes,
            admin,
        })
    }
}

fn parse_number<T>(name: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.filter(|value| !value.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}
