//! Phone verification flow.
//!
//! ```text
//! [NO_CODE] --send_code(valid captcha)--> [ACTIVE(attempts=0)]
//! [ACTIVE]  --verify(wrong, attempts<max)--> [ACTIVE(attempts+1)]   CODE_INVALID
//! [ACTIVE]  --verify(any, attempts>=max)--> [ACTIVE]                TOO_MANY_ATTEMPTS
//! [ACTIVE]  --verify(expired)-->            [NO_CODE]               CODE_EXPIRED
//! [ACTIVE]  --verify(correct)-->            [NO_CODE] + lead record
//! ```

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;

use leadgate_common::{
    ErrorCode, LeadMeta, LeadgateError, NewLead, OtpEntry, Phone, normalize_name, parse_amount,
};

use crate::captcha::CaptchaVerifier;
use crate::leads::LeadService;
use crate::otp::{OtpStore, generate_code};
use crate::sms::SmsSender;

/// Flow limits
#[derive(Debug, Clone)]
pub struct VerificationSettings {
    /// SMS code validity
    pub code_ttl: Duration,
    /// Failed verifications before a code is locked
    pub max_attempts: u32,
}

/// A freshly issued code. The route decides whether the code may be echoed.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Verification request, including the lead fields recorded on success
#[derive(Debug, Clone, Default)]
pub struct VerifyCode {
    pub phone: String,
    pub code: String,
    pub name: Option<String>,
    pub sum: Value,
    pub source: Option<String>,
}

pub struct VerificationFlow {
    captcha: Arc<CaptchaVerifier>,
    codes: Arc<dyn OtpStore>,
    leads: Arc<LeadService>,
    sms: Arc<dyn SmsSender>,
    settings: VerificationSettings,
}

impl VerificationFlow {
    pub fn new(
        captcha: Arc<CaptchaVerifier>,
        codes: Arc<dyn OtpStore>,
        leads: Arc<LeadService>,
        sms: Arc<dyn SmsSender>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            captcha,
            codes,
            leads,
            sms,
            settings,
        }
    }

    /// Validate phone and captcha, then issue a code replacing any previous one
    pub async fn send_code(
        &self,
        phone: &str,
        captcha_id: &str,
        captcha_answer: &str,
    ) -> Result<IssuedCode, LeadgateError> {
        let phone = Phone::parse(phone)?;
        self.captcha.consume_and_check(captcha_id, captcha_answer).await?;

        let entry = OtpEntry::new(&phone, generate_code(), self.settings.code_ttl);
        self.codes
            .replace(&entry)
            .await
            .map_err(LeadgateError::storage)?;

        self.sms
            .send_code(&phone, &entry.code, self.settings.code_ttl)
            .await
            .map_err(|e| LeadgateError::Internal(format!("SMS delivery failed: {e:#}")))?;

        tracing::info!(phone = %phone.masked(), "Verification code issued");

        Ok(IssuedCode {
            code: entry.code,
            expires_at: entry.expires_at,
        })
    }

    /// Check a code. On success the code is consumed and a lead is
    /// recorded; returns the new lead id.
    pub async fn verify_code(&self, request: VerifyCode) -> Result<i64, LeadgateError> {
        let phone = Phone::parse(&request.phone)?;
        let key = phone.as_str();

        let entry = self
            .codes
            .get(key)
            .await
            .map_err(LeadgateError::storage)?
            .ok_or(ErrorCode::CodeNotFound)?;

        if entry.is_expired_at(Utc::now()) {
            self.codes.remove(key).await.map_err(LeadgateError::storage)?;
            tracing::debug!(phone = %phone.masked(), "Verification code expired");
            return Err(ErrorCode::CodeExpired.into());
        }

        if entry.attempts_exhausted(self.settings.max_attempts) {
            tracing::warn!(
                phone = %phone.masked(),
                attempts = entry.attempts,
                "Verification code locked after too many attempts"
            );
            return Err(ErrorCode::TooManyAttempts.into());
        }

        if request.code != entry.code {
            self.codes
                .increment_attempts(key)
                .await
                .map_err(LeadgateError::storage)?;
            tracing::debug!(
                phone = %phone.masked(),
                attempts = entry.attempts + 1,
                "Verification code mismatch"
            );
            return Err(ErrorCode::CodeInvalid.into());
        }

        // Whoever deletes the entry owns the success; a concurrent duplicate loses
        if !self.codes.remove(key).await.map_err(LeadgateError::storage)? {
            return Err(ErrorCode::CodeNotFound.into());
        }

        self.leads
            .record(NewLead {
                name: normalize_name(request.name),
                phone,
                sum: parse_amount(&request.sum),
                meta: LeadMeta::otp_verified(request.source),
            })
            .await
    }
}
