//! Core types shared across Leadgate components.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{MIN_PHONE_DIGITS, sources};
use crate::error::{ErrorCode, LeadgateError};

/// Phone number reduced to its digits.
///
/// The only way to build one is [`Phone::parse`], so holding a `Phone`
/// means the number passed the minimum-length check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Strip everything but ASCII digits and require at least
    /// [`MIN_PHONE_DIGITS`] of them.
    pub fn parse(raw: &str) -> Result<Self, LeadgateError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < MIN_PHONE_DIGITS {
            return Err(ErrorCode::InvalidPhone.into());
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All but the last four digits hidden, for logs
    pub fn masked(&self) -> String {
        let visible = self.0.len().saturating_sub(4);
        format!("{}{}", "*".repeat(visible), &self.0[visible..])
    }
}

impl std::fmt::Display for Phone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// CAPTCHA challenge data sent to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    /// Unique challenge ID
    pub id: String,

    /// Human-readable question, e.g. "How much is 3 + 4?"
    pub question: String,

    /// Expected answer (server-side only, not sent to client)
    #[serde(skip_serializing, default)]
    pub answer: String,

    /// Challenge expiry
    pub expires_at: DateTime<Utc>,
}

/// One active SMS verification code. At most one exists per phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpEntry {
    /// Normalized phone digits (store key)
    pub phone: String,

    /// Fixed-length numeric code
    pub code: String,

    /// Failed verification attempts so far
    pub attempts: u32,

    /// Code expiry
    pub expires_at: DateTime<Utc>,
}

impl OtpEntry {
    pub fn new(phone: &Phone, code: String, ttl: Duration) -> Self {
        Self {
            phone: phone.as_str().to_string(),
            code,
            attempts: 0,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Expired strictly after `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn attempts_exhausted(&self, max_attempts: u32) -> bool {
        self.attempts >= max_attempts
    }
}

/// How a lead's phone number was confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    /// SMS one-time code
    Otp,
}

/// Free-form metadata stored alongside a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadMeta {
    /// Channel the lead came from
    pub source: String,

    /// Arbitrary client payload (direct submissions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,

    /// Verification method (OTP submissions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<VerificationMethod>,
}

impl LeadMeta {
    /// Metadata for a lead submitted straight from the form
    pub fn direct(source: Option<String>, extra: Option<Value>) -> Self {
        Self {
            source: source_or(source, sources::DIRECT),
            extra: extra.filter(|v| !v.is_null()),
            via: None,
        }
    }

    /// Metadata for a lead finalized by a verified SMS code
    pub fn otp_verified(source: Option<String>) -> Self {
        Self {
            source: source_or(source, sources::SMS_VERIFIED),
            extra: None,
            via: Some(VerificationMethod::Otp),
        }
    }
}

fn source_or(source: Option<String>, default: &str) -> String {
    source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Insert payload for the lead store
#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: Option<String>,
    pub phone: Phone,
    pub sum: Option<i64>,
    pub meta: LeadMeta,
}

/// A persisted lead. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: i64,
    pub name: Option<String>,
    pub phone: String,
    pub sum: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub meta: LeadMeta,
}

/// Blank names are stored as null
pub fn normalize_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Interpret a client-supplied amount.
///
/// Accepts a JSON number or a numeric string. Null, empty, zero and
/// non-numeric values mean "no amount". Fractions round to the nearest unit.
pub fn parse_amount(value: &Value) -> Option<i64> {
    let amount = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(round_amount))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(round_amount))?
        }
        _ => return None,
    };
    (amount != 0).then_some(amount)
}

fn round_amount(value: f64) -> i64 {
    value.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phone_normalization() {
        let phone = Phone::parse("+7 (999) 123-45-67").unwrap();
        assert_eq!(phone.as_str(), "79991234567");
        assert_eq!(phone.masked(), "*******4567");
    }

    #[test]
    fn test_phone_too_short() {
        for raw in ["", "abc", "123-456-789", "(999) 12"] {
            let err = Phone::parse(raw).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidPhone);
        }
    }

    #[test]
    fn test_otp_entry_expiry_is_strict() {
        let phone = Phone::parse("9991234567").unwrap();
        let entry = OtpEntry::new(&phone, "1234".into(), Duration::seconds(300));
        assert!(!entry.is_expired_at(entry.expires_at));
        assert!(entry.is_expired_at(entry.expires_at + Duration::milliseconds(1)));
        assert_eq!(entry.attempts, 0);
        assert!(!entry.attempts_exhausted(5));
    }

    #[test]
    fn test_lead_meta_defaults() {
        let meta = LeadMeta::direct(None, Some(Value::Null));
        assert_eq!(meta.source, "web");
        assert!(meta.extra.is_none());

        let meta = LeadMeta::otp_verified(Some(String::new()));
        assert_eq!(meta.source, "sms-verified");
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({"source": "sms-verified", "via": "otp"})
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&json!(150000)), Some(150000));
        assert_eq!(parse_amount(&json!("250000")), Some(250000));
        assert_eq!(parse_amount(&json!(" 99.6 ")), Some(100));
        assert_eq!(parse_amount(&json!(0)), None);
        assert_eq!(parse_amount(&json!("")), None);
        assert_eq!(parse_amount(&json!("lots")), None);
        assert_eq!(parse_amount(&Value::Null), None);
    }

    #[test]
    fn test_captcha_answer_not_serialized() {
        let challenge = CaptchaChallenge {
            id: "abc".into(),
            question: "How much is 3 + 4?".into(),
            answer: "7".into(),
            expires_at: Utc::now(),
        };
        let json = serde_json::to_value(&challenge).unwrap();
        assert!(json.get("answer").is_none());
    }
}
