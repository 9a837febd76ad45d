//! Arithmetic CAPTCHA issuance and verification.
//!
//! A challenge is a single-digit addition. The expected answer lives in a
//! [`CaptchaStore`] keyed by an opaque id until it is answered correctly or
//! found expired.

mod generator;
mod store;
mod verifier;

pub use generator::CaptchaGenerator;
pub use store::{MemoryCaptchaStore, RedisCaptchaStore};
pub use verifier::CaptchaVerifier;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored challenge data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChallenge {
    /// The expected answer
    pub answer: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

/// Key-value storage for pending challenges.
///
/// Entries must stay readable for a while after `expires_at` so the
/// verifier can tell "expired" from "never existed".
#[async_trait]
pub trait CaptchaStore: Send + Sync {
    async fn put(&self, id: &str, challenge: &StoredChallenge) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<StoredChallenge>>;

    /// Delete a challenge. Returns true only for the caller that removed it.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Backend health check
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
