//! Configuration management for Leadgate.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use leadgate_common::LeadgateError;
use leadgate_common::constants::{
    CAPTCHA_TTL_SECS, CODE_TTL_SECS, DEFAULT_DATABASE_PATH, DEFAULT_LISTEN_ADDR,
    DEFAULT_REDIS_URL, DEFAULT_REQUEST_TIMEOUT_SECS, EXPIRED_RETENTION_SECS, MAX_CODE_ATTEMPTS,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Redis connection URL (only used by Redis-backed stores)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// DEBUG ONLY: echo captcha answers and SMS codes in API responses.
    /// Never enable outside local testing.
    #[serde(default)]
    pub sms_echo: bool,

    /// Store backends
    #[serde(default)]
    pub storage: StorageConfig,

    /// Captcha and SMS code lifetimes
    #[serde(default)]
    pub verification: VerificationConfig,

    /// HTTP layer settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Which implementation backs a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Captcha challenges: memory | redis
    #[serde(default = "default_captcha_backend")]
    pub captcha: StoreBackend,

    /// SMS codes: sqlite | redis | memory
    #[serde(default = "default_otp_backend")]
    pub otp: StoreBackend,

    /// Lead records: sqlite | memory
    #[serde(default = "default_leads_backend")]
    pub leads: StoreBackend,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            captcha: default_captcha_backend(),
            otp: default_otp_backend(),
            leads: default_leads_backend(),
            database_path: default_database_path(),
        }
    }
}

impl StorageConfig {
    pub fn uses(&self, backend: StoreBackend) -> bool {
        [self.captcha, self.otp, self.leads].contains(&backend)
    }
}

/// Verification lifetimes and limits
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Challenge validity in seconds
    #[serde(default = "default_captcha_ttl")]
    pub captcha_ttl_secs: u64,

    /// SMS code validity in seconds
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: u64,

    /// Failed verifications before a code is locked
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Grace period expired entries stay readable
    #[serde(default = "default_expired_retention")]
    pub expired_retention_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            captcha_ttl_secs: default_captcha_ttl(),
            code_ttl_secs: default_code_ttl(),
            max_attempts: default_max_attempts(),
            expired_retention_secs: default_expired_retention(),
        }
    }
}

/// HTTP layer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_database_path() -> String { DEFAULT_DATABASE_PATH.to_string() }
fn default_captcha_backend() -> StoreBackend { StoreBackend::Memory }
fn default_otp_backend() -> StoreBackend { StoreBackend::Sqlite }
fn default_leads_backend() -> StoreBackend { StoreBackend::Sqlite }
fn default_captcha_ttl() -> u64 { CAPTCHA_TTL_SECS }
fn default_code_ttl() -> u64 { CODE_TTL_SECS }
fn default_max_attempts() -> u32 { MAX_CODE_ATTEMPTS }
fn default_expired_retention() -> u64 { EXPIRED_RETENTION_SECS }
fn default_request_timeout() -> u64 { DEFAULT_REQUEST_TIMEOUT_SECS }

impl AppConfig {
    /// Load configuration from file and `LEADGATE__*` env vars, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config: AppConfig = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .add_source(config::Environment::with_prefix("LEADGATE").separator("__"))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            let settings = config::Config::builder()
                .add_source(config::Environment::with_prefix("LEADGATE").separator("__"))
                .build()
                .context("Failed to read environment config")?;

            settings
                .try_deserialize()
                .context("Failed to parse environment config")?
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        } else if let Some(port) = args.port {
            config.listen_addr = format!("0.0.0.0:{port}");
        }
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref database_path) = args.database_path {
            config.storage.database_path = database_path.clone();
        }
        if args.sms_echo {
            config.sms_echo = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject backend combinations no store implements
    pub fn validate(&self) -> Result<(), LeadgateError> {
        if self.storage.captcha == StoreBackend::Sqlite {
            return Err(LeadgateError::Config(
                "storage.captcha must be `memory` or `redis`".into(),
            ));
        }
        if self.storage.leads == StoreBackend::Redis {
            return Err(LeadgateError::Config(
                "storage.leads must be `sqlite` or `memory`".into(),
            ));
        }
        if self.verification.max_attempts == 0 {
            return Err(LeadgateError::Config(
                "verification.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            redis_url: default_redis_url(),
            sms_echo: false,
            storage: StorageConfig::default(),
            verification: VerificationConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Args;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("leadgate").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.sms_echo);
        assert_eq!(config.storage.captcha, StoreBackend::Memory);
        assert_eq!(config.storage.otp, StoreBackend::Sqlite);
        assert_eq!(config.storage.leads, StoreBackend::Sqlite);
        assert!(!config.storage.uses(StoreBackend::Redis));
        assert_eq!(config.verification.max_attempts, 5);
        assert_eq!(config.verification.code_ttl_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.sms_echo);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.verification.captcha_ttl_secs, 300);
    }

    #[test]
    fn test_rejects_unsupported_backends() {
        let mut config = AppConfig::default();
        config.storage.captcha = StoreBackend::Sqlite;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.leads = StoreBackend::Redis;
        assert!(matches!(config.validate(), Err(LeadgateError::Config(_))));

        let mut config = AppConfig::default();
        config.verification.max_attempts = 0;
        assert!(matches!(config.validate(), Err(LeadgateError::Config(_))));
    }

    #[test]
    fn test_load_file_then_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadgate.toml");
        std::fs::write(
            &path,
            r#"
listen_addr = "127.0.0.1:9000"

[storage]
otp = "memory"
database_path = "from-file.sqlite"

[verification]
max_attempts = 3
"#,
        )
        .unwrap();
        let path = path.to_str().unwrap();

        let config = AppConfig::load(path, &args(&["--config", path])).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.storage.otp, StoreBackend::Memory);
        assert_eq!(config.storage.leads, StoreBackend::Sqlite);
        assert_eq!(config.storage.database_path, "from-file.sqlite");
        assert_eq!(config.verification.max_attempts, 3);
        assert_eq!(config.verification.code_ttl_secs, 300);

        let overrides = args(&[
            "--config",
            path,
            "--port",
            "3000",
            "--database-path",
            "cli.sqlite",
            "--sms-echo",
        ]);
        let config = AppConfig::load(path, &overrides).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.storage.database_path, "cli.sqlite");
        assert!(config.sms_echo);

        let overrides = args(&["--listen", "127.0.0.1:7000", "--port", "3000"]);
        let config = AppConfig::load(path, &overrides).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadgate.toml");
        std::fs::write(&path, "[storage]\ncaptcha = \"sqlite\"\n").unwrap();
        let path = path.to_str().unwrap();

        assert!(AppConfig::load(path, &args(&[])).is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let path = path.to_str().unwrap();

        let config = AppConfig::load(path, &args(&["--listen", "127.0.0.1:8081"])).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8081");
        assert_eq!(config.storage.captcha, StoreBackend::Memory);
    }
}
