//! In-process lead store (tests and throwaway deployments).

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use leadgate_common::{LeadRecord, NewLead};
use tokio::sync::RwLock;

use super::LeadStore;

#[derive(Default)]
pub struct MemoryLeadStore {
    records: RwLock<Vec<LeadRecord>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn create(&self, lead: NewLead) -> Result<i64> {
        let mut records = self.records.write().await;
        let id = records.last().map_or(1, |r| r.id + 1);
        records.push(LeadRecord {
            id,
            name: lead.name,
            phone: lead.phone.as_str().to_string(),
            sum: lead.sum,
            created_at: Utc::now(),
            meta: lead.meta,
        });
        Ok(id)
    }

    async fn list(&self, limit: usize) -> Result<Vec<LeadRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}
