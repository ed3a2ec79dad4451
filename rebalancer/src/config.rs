//! TOML configuration loading and validation.
//!
//! Configuration is validated fully before any network call so malformed
//! credentials abort the run early.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub app_key: String,
    pub app_secret: String,
    pub account_number: String,
    #[serde(default = "default_product_code")]
    pub account_product_code: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_product_code() -> String {
    "01".into()
}
fn default_base_url() -> String {
    "https://openapi.koreainvestment.com:9443".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Delay between consecutive order submissions.
    #[serde(default = "default_interval")]
    pub order_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            order_interval_ms: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
    #[serde(default = "default_token_dir")]
    pub token_cache_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
            token_cache_dir: default_token_dir(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}
fn default_token_dir() -> String {
    "./.cache".into()
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.credentials.app_key.is_empty() {
            return Err(Error::Config("app_key must not be empty".into()));
        }
        if self.credentials.app_secret.is_empty() {
            return Err(Error::Config("app_secret must not be empty".into()));
        }
        if self.credentials.account_number.is_empty() {
            return Err(Error::Config("account_number must not be empty".into()));
        }
        if !self.credentials.base_url.starts_with("http") {
            return Err(Error::Config(format!(
                "base_url '{}' is not an http(s) URL",
                self.credentials.base_url
            )));
        }
        if self.connection.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Broker credentials for the KIS client.
    pub fn broker_credentials(&self) -> kis_broker::Credentials {
        kis_broker::Credentials {
            app_key: self.credentials.app_key.clone(),
            app_secret: self.credentials.app_secret.clone(),
            account_number: self.credentials.account_number.clone(),
            account_product_code: self.credentials.account_product_code.clone(),
            base_url: self.credentials.base_url.clone(),
        }
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> std::path::PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}
