//! Error taxonomy for Leadgate components.

use serde::Serialize;
use thiserror::Error;

/// Machine-readable error codes returned to API callers as `{ok:false, error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidPhone,
    CaptchaNotFound,
    CaptchaExpired,
    CaptchaInvalid,
    CodeNotFound,
    CodeExpired,
    CodeInvalid,
    TooManyAttempts,
    BadJson,
    ServerError,
}

impl ErrorCode {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPhone => "INVALID_PHONE",
            Self::CaptchaNotFound => "CAPTCHA_NOT_FOUND",
            Self::CaptchaExpired => "CAPTCHA_EXPIRED",
            Self::CaptchaInvalid => "CAPTCHA_INVALID",
            Self::CodeNotFound => "CODE_NOT_FOUND",
            Self::CodeExpired => "CODE_EXPIRED",
            Self::CodeInvalid => "CODE_INVALID",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            Self::BadJson => "BAD_JSON",
            Self::ServerError => "SERVER_ERROR",
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TooManyAttempts => 429,
            Self::ServerError => 500,
            _ => 400,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common errors across Leadgate components
#[derive(Debug, Error)]
pub enum LeadgateError {
    /// Request rejected by a business rule; surfaced to the caller as-is
    #[error("Rejected: {0}")]
    Rejected(ErrorCode),

    /// Backing store (SQLite/Redis/memory) failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeadgateError {
    /// Wrap a backend failure, keeping its full context chain
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    /// The code callers see. Anything that isn't a business rejection
    /// collapses into `SERVER_ERROR`.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Rejected(code) => *code,
            Self::Storage(_) | Self::Config(_) | Self::Internal(_) => ErrorCode::ServerError,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.code().status_code()
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<ErrorCode> for LeadgateError {
    fn from(code: ErrorCode) -> Self {
        Self::Rejected(code)
    }
}
