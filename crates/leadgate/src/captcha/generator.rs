//! CAPTCHA challenge generation.

use anyhow::Result;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use leadgate_common::CaptchaChallenge;
use rand::Rng;
use std::sync::Arc;

use super::{CaptchaStore, StoredChallenge};

/// CAPTCHA generator service
pub struct CaptchaGenerator {
    store: Arc<dyn CaptchaStore>,
    /// Challenge TTL
    challenge_ttl: Duration,
}

impl CaptchaGenerator {
    pub fn new(store: Arc<dyn CaptchaStore>, challenge_ttl: Duration) -> Self {
        Self {
            store,
            challenge_ttl,
        }
    }

    /// Issue a new challenge and remember its answer
    pub async fn issue(&self) -> Result<CaptchaChallenge> {
        let id = generate_challenge_id();
        let (a, b) = pick_operands();
        let answer = (a + b).to_string();

        let now = Utc::now();
        let stored = StoredChallenge {
            answer: answer.clone(),
            created_at: now,
            expires_at: now + self.challenge_ttl,
        };
        self.store.put(&id, &stored).await?;

        tracing::debug!(challenge_id = %id, "Generated CAPTCHA challenge");

        Ok(CaptchaChallenge {
            id,
            question: format!("How much is {a} + {b}?"),
            answer,
            expires_at: stored.expires_at,
        })
    }
}

/// Generate a cryptographically random challenge ID
fn generate_challenge_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Two operands in 1..=9
fn pick_operands() -> (u8, u8) {
    let mut rng = rand::rng();
    (rng.random_range(1..=9), rng.random_range(1..=9))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::MemoryCaptchaStore;

    #[tokio::test]
    async fn test_issue_stores_sum() {
        let store = Arc::new(MemoryCaptchaStore::new(Duration::seconds(60)));
        let generator = CaptchaGenerator::new(store.clone(), Duration::seconds(300));

        let challenge = generator.issue().await.unwrap();

        let operands: Vec<u32> = challenge
            .question
            .trim_start_matches("How much is ")
            .trim_end_matches('?')
            .split(" + ")
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(operands.len(), 2);
        assert!(operands.iter().all(|n| (1..=9).contains(n)));

        let stored = store.get(&challenge.id).await.unwrap().unwrap();
        assert_eq!(stored.answer, (operands[0] + operands[1]).to_string());
        assert_eq!(stored.answer, challenge.answer);
        assert_eq!(stored.expires_at - stored.created_at, Duration::seconds(300));
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = Arc::new(MemoryCaptchaStore::new(Duration::seconds(60)));
        let generator = CaptchaGenerator::new(store.clone(), Duration::seconds(300));

        let first = generator.issue().await.unwrap();
        let second = generator.issue().await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 22);
        assert_eq!(store.len().await, 2);
    }
}
