//! In-process code store.

use anyhow::Result;
use async_trait::async_trait;
use leadgate_common::OtpEntry;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::OtpStore;

/// Codes kept in a map behind a lock, which also serializes per-phone updates
#[derive(Default)]
pub struct MemoryOtpStore {
    entries: RwLock<HashMap<String, OtpEntry>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn replace(&self, entry: &OtpEntry) -> Result<()> {
        let mut entry = entry.clone();
        entry.attempts = 0;
        self.entries.write().await.insert(entry.phone.clone(), entry);
        Ok(())
    }

    async fn get(&self, phone: &str) -> Result<Option<OtpEntry>> {
        Ok(self.entries.read().await.get(phone).cloned())
    }

    async fn increment_attempts(&self, phone: &str) -> Result<()> {
        if let Some(entry) = self.entries.write().await.get_mut(phone) {
            entry.attempts += 1;
        }
        Ok(())
    }

    async fn remove(&self, phone: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(phone).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use leadgate_common::Phone;

    #[tokio::test]
    async fn test_replace_resets_entry() {
        let store = MemoryOtpStore::new();
        let phone = Phone::parse("9991234567").unwrap();

        store
            .replace(&OtpEntry::new(&phone, "1111".into(), Duration::minutes(5)))
            .await
            .unwrap();
        store.increment_attempts(phone.as_str()).await.unwrap();
        store.increment_attempts(phone.as_str()).await.unwrap();
        assert_eq!(store.get(phone.as_str()).await.unwrap().unwrap().attempts, 2);

        store
            .replace(&OtpEntry::new(&phone, "2222".into(), Duration::minutes(5)))
            .await
            .unwrap();
        let entry = store.get(phone.as_str()).await.unwrap().unwrap();
        assert_eq!(entry.code, "2222");
        assert_eq!(entry.attempts, 0);
    }

    #[tokio::test]
    async fn test_increment_missing_is_noop() {
        let store = MemoryOtpStore::new();
        store.increment_attempts("9991234567").await.unwrap();
        assert!(store.get("9991234567").await.unwrap().is_none());
        assert!(!store.remove("9991234567").await.unwrap());
    }
}
