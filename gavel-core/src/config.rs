use serde::Deserialize;
use std::path::Path;

use crate::query::DEFAULT_TOP_K;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ACCOUNTS_DATABASE: &str = "gavel.db";
const DEFAULT_CASE_DATABASE: &str = "cases.db";
const DEFAULT_TOKEN_EXPIRY_MINUTES: u64 = 30;
const DEFAULT_INITIAL_POINTS: i64 = 10;

/// Minimum length of the JWT signing secret.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct StorageConfig {
    /// Accounts database (users and balances).
    #[serde(default = "default_accounts_database")]
    pub accounts: String,
    /// Case corpus database, written by `gavel-cli ingest`.
    #[serde(default = "default_case_database")]
    pub cases: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts_database(),
            cases: default_case_database(),
        }
    }
}

fn default_accounts_database() -> String {
    DEFAULT_ACCOUNTS_DATABASE.to_string()
}

fn default_case_database() -> String {
    DEFAULT_CASE_DATABASE.to_string()
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct AuthConfig {
    /// JWT signing secret, inline.
    #[serde(default)]
    pub secret: Option<String>,
    /// Name of an environment variable holding the secret; used when
    /// `secret` is absent so the value stays out of the config file.
    #[serde(default)]
    pub secret_env: Option<String>,
    #[serde(default = "default_token_expiry_minutes")]
    pub token_expiry_minutes: u64,
}

fn default_token_expiry_minutes() -> u64 {
    DEFAULT_TOKEN_EXPIRY_MINUTES
}

impl AuthConfig {
    /// Resolve the signing secret from the inline value or the
    /// environment.
    pub fn resolve_secret(&self) -> Result<String, String> {
        if let Some(ref secret) = self.secret {
            if !secret.is_empty() {
                return Ok(secret.clone());
            }
        }
        match &self.secret_env {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                format!("environment variable '{var_name}' is not set (required by secret_env)")
            }),
            None => Err("auth.secret or auth.secret_env is required".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct AccountsConfig {
    /// Points granted to a freshly registered account.
    #[serde(default = "default_initial_points")]
    pub initial_points: i64,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            initial_points: default_initial_points(),
        }
    }
}

fn default_initial_points() -> i64 {
    DEFAULT_INITIAL_POINTS
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RetrievalConfig {
    /// Cases retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser. Empty disables
    /// the CORS layer entirely.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file '{}': {e}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: Config =
            toml::from_str(contents).map_err(|e| format!("invalid config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.retrieval.top_k == 0 {
            return Err("invalid config: retrieval.top_k must be positive".to_string());
        }
        if let Some(ref secret) = self.auth.secret {
            if !secret.is_empty() && secret.len() < MIN_SECRET_LEN {
                return Err(format!(
                    "invalid config: auth.secret must be at least {MIN_SECRET_LEN} characters"
                ));
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
