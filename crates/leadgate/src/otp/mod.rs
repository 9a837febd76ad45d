//! SMS verification code storage.
//!
//! Phone numbers are unique keys: issuing a new code replaces whatever the
//! phone had before, so at most one code is live per phone.

mod memory;
mod redis_store;

pub use memory::MemoryOtpStore;
pub use redis_store::RedisOtpStore;

use anyhow::Result;
use async_trait::async_trait;
use leadgate_common::OtpEntry;
use leadgate_common::constants::{CODE_MAX, CODE_MIN};
use rand::Rng;

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Insert `entry`, replacing any entry for the same phone
    async fn replace(&self, entry: &OtpEntry) -> Result<()>;

    async fn get(&self, phone: &str) -> Result<Option<OtpEntry>>;

    /// Bump the failed-attempt counter. No-op when the entry is gone.
    async fn increment_attempts(&self, phone: &str) -> Result<()>;

    /// Delete the entry. Returns true only for the caller that removed it.
    async fn remove(&self, phone: &str) -> Result<bool>;

    /// Backend health check
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Uniform 4-digit code
pub fn generate_code() -> String {
    rand::rng().random_range(CODE_MIN..=CODE_MAX).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), 4);
            let value: u32 = code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
    }
}
