//! Challenge storage backends.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tokio::sync::RwLock;

use leadgate_common::constants::redis_keys::CAPTCHA_PREFIX;

use super::{CaptchaStore, StoredChallenge};

/// Process-local challenge map. Lost on restart.
pub struct MemoryCaptchaStore {
    challenges: RwLock<HashMap<String, StoredChallenge>>,
    /// How long past expiry an entry survives before being swept
    retention: Duration,
}

impl MemoryCaptchaStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            challenges: RwLock::new(HashMap::new()),
            retention,
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.challenges.read().await.len()
    }
}

#[async_trait]
impl CaptchaStore for MemoryCaptchaStore {
    async fn put(&self, id: &str, challenge: &StoredChallenge) -> Result<()> {
        let mut challenges = self.challenges.write().await;

        // Lazy eviction: drop anything well past its expiry
        let cutoff = Utc::now() - self.retention;
        challenges.retain(|_, c| c.expires_at >= cutoff);

        challenges.insert(id.to_string(), challenge.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredChallenge>> {
        Ok(self.challenges.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.challenges.write().await.remove(id).is_some())
    }
}

/// Challenges stored as JSON under `captcha:{id}` with a Redis TTL
pub struct RedisCaptchaStore {
    redis: ConnectionManager,
    retention: Duration,
}

impl RedisCaptchaStore {
    pub fn new(redis: ConnectionManager, retention: Duration) -> Self {
        Self { redis, retention }
    }
}

fn challenge_key(id: &str) -> String {
    format!("{CAPTCHA_PREFIX}{id}")
}

/// Redis TTL: time left until expiry plus the retention grace, at least 1s
fn key_ttl_secs(challenge: &StoredChallenge, retention: Duration) -> u64 {
    let remaining = (challenge.expires_at - Utc::now()).num_seconds().max(0);
    (remaining + retention.num_seconds()).max(1) as u64
}

#[async_trait]
impl CaptchaStore for RedisCaptchaStore {
    async fn put(&self, id: &str, challenge: &StoredChallenge) -> Result<()> {
        let mut conn = self.redis.clone();
        let value = serde_json::to_string(challenge)?;
        conn.set_ex::<_, _, ()>(
            challenge_key(id),
            value,
            key_ttl_secs(challenge, self.retention),
        )
        .await
        .context("Failed to store captcha challenge")?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredChallenge>> {
        let mut conn = self.redis.clone();
        let data: Option<String> = conn
            .get(challenge_key(id))
            .await
            .context("Failed to read captcha challenge")?;

        match data {
            Some(d) => Ok(Some(
                serde_json::from_str(&d).context("Corrupt captcha challenge")?,
            )),
            None => Ok(None),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut conn = self.redis.clone();
        let removed: u32 = conn
            .del(challenge_key(id))
            .await
            .context("Failed to delete captcha challenge")?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(expires_in: Duration) -> StoredChallenge {
        let now = Utc::now();
        StoredChallenge {
            answer: "7".into(),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[tokio::test]
    async fn test_memory_store_remove_is_single_shot() {
        let store = MemoryCaptchaStore::new(Duration::seconds(60));
        store.put("a", &challenge(Duration::minutes(5))).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().answer, "7");
        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_sweeps_stale_entries() {
        let store = MemoryCaptchaStore::new(Duration::seconds(60));
        store.put("stale", &challenge(Duration::minutes(-10))).await.unwrap();
        store.put("recent", &challenge(Duration::seconds(-5))).await.unwrap();
        store.put("fresh", &challenge(Duration::minutes(5))).await.unwrap();

        // "stale" went when "recent" was inserted; "recent" is still in its grace window
        assert_eq!(store.len().await, 2);
        assert!(store.get("stale").await.unwrap().is_none());
        assert!(store.get("recent").await.unwrap().is_some());
    }

    #[test]
    fn test_redis_ttl_includes_grace() {
        let retention = Duration::seconds(60);
        let ttl = key_ttl_secs(&challenge(Duration::seconds(300)), retention);
        assert!((359..=360).contains(&ttl));

        let ttl = key_ttl_secs(&challenge(Duration::seconds(-600)), retention);
        assert_eq!(ttl, 60);
    }

    #[test]
    fn test_challenge_key() {
        assert_eq!(challenge_key("abc"), "captcha:abc");
    }
}
