//! Lead records: append-only storage plus the direct submission path.

mod memory;

pub use memory::MemoryLeadStore;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use leadgate_common::constants::LEAD_LIST_LIMIT;
use leadgate_common::{
    LeadMeta, LeadRecord, LeadgateError, NewLead, Phone, normalize_name, parse_amount,
};

/// Append-only lead storage. The store assigns ids and creation times.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Persist a lead and return its id (strictly increasing)
    async fn create(&self, lead: NewLead) -> Result<i64>;

    /// Newest first, at most `limit` records
    async fn list(&self, limit: usize) -> Result<Vec<LeadRecord>>;

    /// Backend health check
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// A form submission that skipped phone verification
#[derive(Debug, Clone, Default)]
pub struct LeadSubmission {
    pub name: Option<String>,
    pub phone: String,
    pub sum: Value,
    pub source: Option<String>,
    pub extra: Option<Value>,
}

/// Lead service wrapping the configured store
pub struct LeadService {
    store: Arc<dyn LeadStore>,
}

impl LeadService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Direct submission: validate the phone and record the lead
    pub async fn submit(&self, submission: LeadSubmission) -> Result<i64, LeadgateError> {
        let phone = Phone::parse(&submission.phone)?;
        self.record(NewLead {
            name: normalize_name(submission.name),
            phone,
            sum: parse_amount(&submission.sum),
            meta: LeadMeta::direct(submission.source, submission.extra),
        })
        .await
    }

    /// Persist an already-validated lead
    pub async fn record(&self, lead: NewLead) -> Result<i64, LeadgateError> {
        let phone = lead.phone.masked();
        let source = lead.meta.source.clone();
        let id = self.store.create(lead).await.map_err(LeadgateError::storage)?;

        tracing::info!(lead_id = id, phone = %phone, source = %source, "Lead recorded");
        Ok(id)
    }

    /// Most recent leads. `limit` is clamped to 1..=100.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<LeadRecord>, LeadgateError> {
        let limit = limit.unwrap_or(LEAD_LIST_LIMIT).clamp(1, LEAD_LIST_LIMIT);
        self.store.list(limit).await.map_err(LeadgateError::storage)
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
