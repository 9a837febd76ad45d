//! Lead submission and listing endpoints.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use leadgate_common::LeadRecord;

use super::{ApiError, CreatedResponse, JsonOrForm, lenient_opt_string, lenient_string};
use crate::leads::LeadSubmission;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LeadRequest {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    phone: String,
    #[serde(default)]
    sum: Value,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    source: Option<String>,
    #[serde(default)]
    extra: Option<Value>,
}

/// Record a lead without phone verification
pub async fn submit_lead(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<LeadRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let id = state
        .leads
        .submit(LeadSubmission {
            name: request.name,
            phone: request.phone,
            sum: request.sum,
            source: request.source,
            extra: request.extra,
        })
        .await?;

    Ok(Json(CreatedResponse::new(id)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LeadListResponse {
    ok: bool,
    items: Vec<LeadRecord>,
}

/// Most recent leads, newest first
pub async fn list_leads(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<LeadListResponse>, ApiError> {
    // An unparseable limit falls back to the default
    let limit = query.ok().and_then(|Query(q)| q.limit);
    let items = state.leads.list(limit).await?;

    Ok(Json(LeadListResponse { ok: true, items }))
}
