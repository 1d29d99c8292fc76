//! In-memory [`ReceiptStore`] implementation for testing.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Conflict semantics match
//! the SQLite backend: the first insert of a `receipt_id` wins, later ones
//! fail.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{PersistedReceipt, ReceiptRecord};

use super::{format_ts_iso, ReceiptStore, StoreError};

/// In-memory store used as a deterministic test double.
#[derive(Default)]
pub struct MemoryStore {
    receipts: RwLock<HashMap<String, PersistedReceipt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn insert_receipt(&self, record: &ReceiptRecord) -> Result<PersistedReceipt, StoreError> {
        let mut receipts = self.receipts.write().unwrap();
        if receipts.contains_key(&record.receipt_id) {
            return Err(StoreError::Conflict {
                receipt_id: record.receipt_id.clone(),
            });
        }

        let now = chrono::Utc::now().timestamp();
        let persisted = PersistedReceipt {
            id: Uuid::new_v4().to_string(),
            record: record.clone(),
            ingested_at: format_ts_iso(now),
            updated_at: format_ts_iso(now),
        };
        receipts.insert(record.receipt_id.clone(), persisted.clone());
        Ok(persisted)
    }

    async fn get_receipt(&self, receipt_id: &str) -> Result<Option<PersistedReceipt>, StoreError> {
        let receipts = self.receipts.read().unwrap();
        Ok(receipts.get(receipt_id).cloned())
    }
}
