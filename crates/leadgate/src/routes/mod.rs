//! HTTP route handlers for Leadgate.

use axum::{
    BoxError, Form, Router,
    body::Bytes,
    error_handling::HandleErrorLayer,
    extract::{FromRequest, Request},
    http::{StatusCode, header::CONTENT_TYPE},
    routing::{get, post},
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tower::{ServiceBuilder, timeout::TimeoutLayer, timeout::error::Elapsed};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use leadgate_common::{ErrorCode, LeadgateError};

use crate::state::AppState;

mod captcha;
mod error;
mod health;
mod leads;
mod sms;

pub use error::ApiError;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let timeout = state.config.http.request_timeout();

    Router::new()
        // Health & Status
        .route("/api/health", get(health::health_check))
        .route("/api/ready", get(health::ready_check))

        // Captcha + SMS verification
        .route("/api/captcha/new", post(captcha::new_challenge))
        .route("/api/sms/send", post(sms::send_code))
        .route("/api/sms/verify", post(sms::verify_code))

        // Leads
        .route("/api/request", post(leads::submit_lead))
        .route("/api/requests", get(leads::list_leads))

        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_layer_error))
                .layer(TimeoutLayer::new(timeout)),
        )
        .layer(TraceLayer::new_for_http())
        // The landing page may be served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Middleware failures (timeouts) still answer with `{ok:false, error}`
async fn handle_layer_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out");
        return ApiError::with_status(
            LeadgateError::Internal("request timed out".to_string()),
            StatusCode::REQUEST_TIMEOUT,
        );
    }
    LeadgateError::Internal(format!("middleware error: {err}")).into()
}

/// `{ok:true, id}`
#[derive(Serialize)]
pub struct CreatedResponse {
    ok: bool,
    id: i64,
}

impl CreatedResponse {
    pub fn new(id: i64) -> Self {
        Self { ok: true, id }
    }
}

/// Request body sent either as JSON or as an urlencoded form.
///
/// Broken JSON or a malformed form is `BAD_JSON`. An empty body, or one
/// with any other content type, is read as an empty object.
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_default();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            return match Form::<T>::from_request(req, state).await {
                Ok(Form(body)) => Ok(Self(body)),
                Err(rejection) => {
                    tracing::debug!(error = %rejection.body_text(), "Rejected form body");
                    Err(ErrorCode::BadJson.into())
                }
            };
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(error = %rejection.body_text(), "Unreadable request body");
            ApiError::from(ErrorCode::BadJson)
        })?;
        if bytes.is_empty() || !is_json_content_type(&content_type) {
            return Ok(Self(T::default()));
        }

        serde_json::from_slice(&bytes).map(Self).map_err(|err| {
            tracing::debug!(error = %err, "Rejected JSON body");
            ErrorCode::BadJson.into()
        })
    }
}

/// `application/json` and `application/*+json`
fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Accept strings, numbers or null where a string is expected
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

/// Like [`lenient_string`], keeping null as `None`
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}
