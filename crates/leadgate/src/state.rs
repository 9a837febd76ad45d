//! Application state and shared resources.

use anyhow::{Context, Result};
use chrono::Duration;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::captcha::{
    CaptchaGenerator, CaptchaStore, CaptchaVerifier, MemoryCaptchaStore, RedisCaptchaStore,
};
use crate::config::{AppConfig, StoreBackend};
use crate::db::Database;
use crate::leads::{LeadService, LeadStore, MemoryLeadStore};
use crate::otp::{MemoryOtpStore, OtpStore, RedisOtpStore};
use crate::sms::{LogSmsSender, SmsSender};
use crate::verification::{VerificationFlow, VerificationSettings};

/// Concrete store implementations chosen by configuration
#[derive(Clone)]
pub struct Backends {
    pub captcha: Arc<dyn CaptchaStore>,
    pub otp: Arc<dyn OtpStore>,
    pub leads: Arc<dyn LeadStore>,
    pub sms: Arc<dyn SmsSender>,
}

impl Backends {
    /// Open the configured stores. Redis and SQLite are only touched when
    /// some store actually uses them.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let retention = Duration::seconds(config.verification.expired_retention_secs as i64);
        let storage = &config.storage;

        let redis = if storage.uses(StoreBackend::Redis) {
            // Connection manager handles reconnection
            let client = redis::Client::open(config.redis_url.as_str())
                .context("Failed to create Redis client")?;
            let manager = ConnectionManager::new(client)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!(url = %config.redis_url, "Redis connected");
            Some(manager)
        } else {
            None
        };

        let database = if storage.uses(StoreBackend::Sqlite) {
            let db = Database::open(&storage.database_path)?;
            tracing::info!(path = %storage.database_path, "SQLite database opened");
            Some(db)
        } else {
            None
        };

        let redis_conn = || {
            redis
                .clone()
                .context("Redis backend selected but no connection was opened")
        };
        let sqlite = || {
            database
                .clone()
                .context("SQLite backend selected but no database was opened")
        };

        let captcha: Arc<dyn CaptchaStore> = match storage.captcha {
            StoreBackend::Redis => Arc::new(RedisCaptchaStore::new(redis_conn()?, retention)),
            _ => Arc::new(MemoryCaptchaStore::new(retention)),
        };

        let otp: Arc<dyn OtpStore> = match storage.otp {
            StoreBackend::Redis => Arc::new(RedisOtpStore::new(redis_conn()?, retention)),
            StoreBackend::Sqlite => Arc::new(sqlite()?),
            StoreBackend::Memory => Arc::new(MemoryOtpStore::new()),
        };

        let leads: Arc<dyn LeadStore> = match storage.leads {
            StoreBackend::Sqlite => Arc::new(sqlite()?),
            _ => Arc::new(MemoryLeadStore::new()),
        };

        Ok(Self {
            captcha,
            otp,
            leads,
            sms: Arc::new(LogSmsSender),
        })
    }

    /// Everything in process memory
    #[cfg(test)]
    pub fn in_memory(config: &AppConfig) -> Self {
        let retention = Duration::seconds(config.verification.expired_retention_secs as i64);
        Self {
            captcha: Arc::new(MemoryCaptchaStore::new(retention)),
            otp: Arc::new(MemoryOtpStore::new()),
            leads: Arc::new(MemoryLeadStore::new()),
            sms: Arc::new(LogSmsSender),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// CAPTCHA generator
    pub captcha_generator: Arc<CaptchaGenerator>,

    /// Phone verification flow
    pub verification: Arc<VerificationFlow>,

    /// Lead submission and listing
    pub leads: Arc<LeadService>,

    /// Raw stores, kept for readiness checks
    pub backends: Backends,
}

impl AppState {
    /// Create application state, opening the configured backends
    pub async fn new(config: AppConfig) -> Result<Self> {
        let backends = Backends::connect(&config).await?;
        Ok(Self::with_backends(config, backends))
    }

    /// Wire services on top of already-open backends
    pub fn with_backends(config: AppConfig, backends: Backends) -> Self {
        let verification_config = &config.verification;
        let captcha_ttl = Duration::seconds(verification_config.captcha_ttl_secs as i64);
        let settings = VerificationSettings {
            code_ttl: Duration::seconds(verification_config.code_ttl_secs as i64),
            max_attempts: verification_config.max_attempts,
        };

        let captcha_generator = Arc::new(CaptchaGenerator::new(
            backends.captcha.clone(),
            captcha_ttl,
        ));
        let captcha_verifier = Arc::new(CaptchaVerifier::new(backends.captcha.clone()));
        let leads = Arc::new(LeadService::new(backends.leads.clone()));
        let verification = Arc::new(VerificationFlow::new(
            captcha_verifier,
            backends.otp.clone(),
            leads.clone(),
            backends.sms.clone(),
            settings,
        ));

        Self {
            config,
            captcha_generator,
            verification,
            leads,
            backends,
        }
    }

    /// DEBUG ONLY: whether secrets may be echoed in responses
    pub fn echo_secrets(&self) -> bool {
        self.config.sms_echo
    }

    /// Ping every store; the first failure wins
    pub async fn check_backends(&self) -> Result<()> {
        self.backends.captcha.ping().await.context("captcha store")?;
        self.backends.otp.ping().await.context("code store")?;
        self.leads.ping().await.context("lead store")?;
        Ok(())
    }
}
