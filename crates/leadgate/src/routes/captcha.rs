//! CAPTCHA issuance endpoint.

use axum::{Json, extract::State};
use serde::Serialize;

use leadgate_common::LeadgateError;

use super::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ChallengeResponse {
    ok: bool,
    id: String,
    question: String,
    /// DEBUG ONLY: present when echo mode is on
    #[serde(rename = "echoAnswer", skip_serializing_if = "Option::is_none")]
    echo_answer: Option<String>,
}

/// Issue a new arithmetic challenge
pub async fn new_challenge(
    State(state): State<AppState>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state
        .captcha_generator
        .issue()
        .await
        .map_err(LeadgateError::storage)?;

    Ok(Json(ChallengeResponse {
        ok: true,
        id: challenge.id,
        question: challenge.question,
        echo_answer: state.echo_secrets().then_some(challenge.answer),
    }))
}
