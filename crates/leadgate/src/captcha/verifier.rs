//! CAPTCHA verification logic.

use chrono::Utc;
use leadgate_common::{ErrorCode, LeadgateError};
use std::sync::Arc;

use super::CaptchaStore;

/// CAPTCHA verifier service
pub struct CaptchaVerifier {
    store: Arc<dyn CaptchaStore>,
}

impl CaptchaVerifier {
    pub fn new(store: Arc<dyn CaptchaStore>) -> Self {
        Self { store }
    }

    /// Check an answer and consume the challenge on success.
    ///
    /// - unknown id: `CAPTCHA_NOT_FOUND`
    /// - past expiry: `CAPTCHA_EXPIRED`, challenge deleted
    /// - wrong answer: `CAPTCHA_INVALID`, challenge stays live for a retry
    /// - right answer: challenge deleted
    pub async fn consume_and_check(&self, id: &str, answer: &str) -> Result<(), LeadgateError> {
        let challenge = self
            .store
            .get(id)
            .await
            .map_err(LeadgateError::storage)?
            .ok_or(ErrorCode::CaptchaNotFound)?;

        if Utc::now() > challenge.expires_at {
            self.store.remove(id).await.map_err(LeadgateError::storage)?;
            tracing::debug!(challenge_id = %id, "CAPTCHA expired");
            return Err(ErrorCode::CaptchaExpired.into());
        }

        if answer.trim() != challenge.answer {
            tracing::debug!(challenge_id = %id, "CAPTCHA verification failed");
            return Err(ErrorCode::CaptchaInvalid.into());
        }

        // Single-use: only the request that actually deletes it wins
        if !self.store.remove(id).await.map_err(LeadgateError::storage)? {
            return Err(ErrorCode::CaptchaNotFound.into());
        }

        tracing::debug!(challenge_id = %id, "CAPTCHA verified successfully");
        Ok(())
    }
}
