//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use leadgate_common::{ErrorCode, LeadgateError};

/// `{ok:false, error:"CODE"}`
#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: ErrorCode,
}

/// Handler error; every failure leaves as a structured body
#[derive(Debug)]
pub struct ApiError {
    error: LeadgateError,
    /// Overrides the status derived from the error code
    status: Option<StatusCode>,
}

impl ApiError {
    /// Keep the error code but answer with `status`
    pub fn with_status(error: LeadgateError, status: StatusCode) -> Self {
        Self {
            error,
            status: Some(status),
        }
    }

    /// Dependency down: 503 instead of 500
    pub fn unavailable(error: LeadgateError) -> Self {
        Self::with_status(error, StatusCode::SERVICE_UNAVAILABLE)
    }
}

impl From<LeadgateError> for ApiError {
    fn from(error: LeadgateError) -> Self {
        Self { error, status: None }
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        LeadgateError::Rejected(code).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error.code();
        if code == ErrorCode::ServerError {
            tracing::error!(
                error = %self.error,
                retryable = self.error.is_retryable(),
                "Request failed"
            );
        }

        let status = self.status.unwrap_or_else(|| {
            StatusCode::from_u16(code.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        });
        (status, Json(ErrorBody { ok: false, error: code })).into_response()
    }
}
