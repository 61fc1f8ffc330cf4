//! History store implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmcr_core::Result;
use tokio::sync::RwLock;
use tracing::debug;

use crate::record::CycleRecord;

/// Append-only store of cycle records.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a record.
    async fn append(&self, record: CycleRecord) -> Result<()>;

    /// All records in insertion order.
    async fn all(&self) -> Result<Vec<CycleRecord>>;

    /// Records of cycles started for `intent_id`.
    async fn for_intent(&self, intent_id: &str) -> Result<Vec<CycleRecord>>;

    /// Records stamped at or after `since`.
    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<CycleRecord>>;

    /// Number of records.
    async fn len(&self) -> usize;
}

/// In-memory implementation of HistoryStore.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    records: Arc<RwLock<Vec<CycleRecord>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: CycleRecord) -> Result<()> {
        debug!(intent_id = %record.intent_id, was_valid = record.was_valid, "Recorded cycle");
        self.records.write().await.push(record);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<CycleRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn for_intent(&self, intent_id: &str) -> Result<Vec<CycleRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.intent_id == intent_id)
            .cloned()
            .collect())
    }

    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<CycleRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}
