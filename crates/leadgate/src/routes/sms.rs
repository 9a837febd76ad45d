//! SMS code issuance and verification endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, CreatedResponse, JsonOrForm, lenient_opt_string, lenient_string};
use crate::state::AppState;
use crate::verification::VerifyCode;

#[derive(Debug, Default, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    phone: String,
    #[serde(default, rename = "captchaId", deserialize_with = "lenient_string")]
    captcha_id: String,
    /// The captcha answer
    #[serde(default, deserialize_with = "lenient_string")]
    captcha: String,
}

#[derive(Serialize)]
pub struct SendCodeResponse {
    ok: bool,
    /// DEBUG ONLY: present when echo mode is on
    #[serde(rename = "echoCode", skip_serializing_if = "Option::is_none")]
    echo_code: Option<String>,
}

/// Check the captcha and send a verification code
pub async fn send_code(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>, ApiError> {
    let issued = state
        .verification
        .send_code(&request.phone, &request.captcha_id, &request.captcha)
        .await?;
    tracing::debug!(expires_at = %issued.expires_at, "Verification code dispatched");

    Ok(Json(SendCodeResponse {
        ok: true,
        echo_code: state.echo_secrets().then_some(issued.code),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyCodeRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    code: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    name: Option<String>,
    #[serde(default)]
    sum: Value,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    source: Option<String>,
}

/// Verify a code; on success the lead is recorded
pub async fn verify_code(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<VerifyCodeRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let id = state
        .verification
        .verify_code(VerifyCode {
            phone: request.phone,
            code: request.code,
            name: request.name,
            sum: request.sum,
            source: request.source,
        })
        .await?;

    Ok(Json(CreatedResponse::new(id)))
}
