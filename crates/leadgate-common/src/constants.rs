//! Shared constants for Leadgate components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default SQLite database path (leads and SMS codes)
pub const DEFAULT_DATABASE_PATH: &str = "data/leadgate.sqlite";

/// CAPTCHA challenge validity (5 minutes)
pub const CAPTCHA_TTL_SECS: u64 = 300;

/// SMS code validity (5 minutes)
pub const CODE_TTL_SECS: u64 = 300;

/// Failed verifications allowed before a code is locked
pub const MAX_CODE_ATTEMPTS: u32 = 5;

/// How long an expired entry is kept around so callers see an explicit
/// "expired" error instead of "not found"
pub const EXPIRED_RETENTION_SECS: u64 = 60;

/// Smallest and largest SMS code (4 digits)
pub const CODE_MIN: u32 = 1000;
pub const CODE_MAX: u32 = 9999;

/// Minimum digit count for a phone number
pub const MIN_PHONE_DIGITS: usize = 10;

/// Hard cap on lead listings
pub const LEAD_LIST_LIMIT: usize = 100;

/// Default request timeout for the HTTP layer
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Lead sources used when the client sends none
pub mod sources {
    /// Direct form submission
    pub const DIRECT: &str = "web";

    /// Submission finalized through SMS verification
    pub const SMS_VERIFIED: &str = "sms-verified";
}

/// Redis key prefixes
pub mod redis_keys {
    /// CAPTCHA challenge: captcha:{challenge_id}
    pub const CAPTCHA_PREFIX: &str = "captcha:";

    /// Active SMS code: otp:{phone}
    pub const OTP_PREFIX: &str = "otp:";
}
