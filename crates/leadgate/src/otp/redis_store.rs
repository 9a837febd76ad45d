//! Redis-backed code store.
//!
//! Each code is a hash under `otp:{phone}` with `code`, `attempts` and
//! `expires_at` (unix millis) fields and a key TTL covering expiry plus a
//! retention grace.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;

use leadgate_common::OtpEntry;
use leadgate_common::constants::redis_keys::OTP_PREFIX;

use super::OtpStore;

/// HINCRBY only when the hash still exists, so a concurrent delete
/// doesn't resurrect a partial entry
const INCREMENT_IF_EXISTS: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('HINCRBY', KEYS[1], 'attempts', 1)
end
return 0
"#;

pub struct RedisOtpStore {
    redis: ConnectionManager,
    retention: Duration,
    increment: redis::Script,
}

impl RedisOtpStore {
    pub fn new(redis: ConnectionManager, retention: Duration) -> Self {
        Self {
            redis,
            retention,
            increment: redis::Script::new(INCREMENT_IF_EXISTS),
        }
    }
}

fn otp_key(phone: &str) -> String {
    format!("{OTP_PREFIX}{phone}")
}

fn key_ttl_secs(entry: &OtpEntry, retention: Duration) -> i64 {
    let remaining = (entry.expires_at - Utc::now()).num_seconds().max(0);
    (remaining + retention.num_seconds()).max(1)
}

fn entry_from_fields(phone: &str, fields: &HashMap<String, String>) -> Result<OtpEntry> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| anyhow!("OTP entry for {phone} missing field `{name}`"))
    };

    let expires_ms: i64 = field("expires_at")?.parse().context("Corrupt OTP expiry")?;
    let expires_at = DateTime::<Utc>::from_timestamp_millis(expires_ms)
        .ok_or_else(|| anyhow!("OTP expiry out of range: {expires_ms}"))?;

    Ok(OtpEntry {
        phone: phone.to_string(),
        code: field("code")?.clone(),
        attempts: field("attempts")?.parse().context("Corrupt OTP attempts")?,
        expires_at,
    })
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn replace(&self, entry: &OtpEntry) -> Result<()> {
        let key = otp_key(&entry.phone);
        let expires_ms = entry.expires_at.timestamp_millis().to_string();
        let mut conn = self.redis.clone();

        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(
                &key,
                &[
                    ("code", entry.code.as_str()),
                    ("attempts", "0"),
                    ("expires_at", expires_ms.as_str()),
                ],
            )
            .ignore()
            .expire(&key, key_ttl_secs(entry, self.retention))
            .ignore()
            .query_async(&mut conn)
            .await
            .context("Failed to store OTP entry")?;

        Ok(())
    }

    async fn get(&self, phone: &str) -> Result<Option<OtpEntry>> {
        let mut conn = self.redis.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(otp_key(phone))
            .await
            .context("Failed to read OTP entry")?;

        if fields.is_empty() {
            return Ok(None);
        }
        entry_from_fields(phone, &fields).map(Some)
    }

    async fn increment_attempts(&self, phone: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: i64 = self
            .increment
            .key(otp_key(phone))
            .invoke_async(&mut conn)
            .await
            .context("Failed to record OTP attempt")?;
        Ok(())
    }

    async fn remove(&self, phone: &str) -> Result<bool> {
        let mut conn = self.redis.clone();
        let removed: u32 = conn
            .del(otp_key(phone))
            .await
            .context("Failed to delete OTP entry")?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
