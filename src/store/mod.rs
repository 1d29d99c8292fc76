//! Persistence gateway for receipt records.
//!
//! The [`ReceiptStore`] trait defines the two operations the core needs —
//! keyed insert and read-by-identifier — enabling pluggable backends
//! (SQLite for the service, in-memory for deterministic tests).
//!
//! Uniqueness of `receipt_id` is the store's contract and the system's sole
//! concurrency-correctness mechanism: concurrent inserts of the same
//! identifier must produce exactly one success, all others
//! [`StoreError::Conflict`]. Implementations must be `Send + Sync`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{PersistedReceipt, ReceiptRecord};

/// Typed persistence failures, mapped to HTTP statuses at the server layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this external receipt identifier already exists.
    /// Inserts never silently overwrite.
    #[error("receipt already exists: {receipt_id}")]
    Conflict { receipt_id: String },

    /// The backing store cannot be reached (pool exhausted, connection
    /// refused). Surfaced as service-unavailable; the core does not retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Abstract persistence backend for receipt records.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Insert a reconciled record keyed by its external receipt identifier.
    ///
    /// Returns the persisted receipt with gateway-assigned row id and
    /// timestamps, or [`StoreError::Conflict`] when the identifier exists.
    async fn insert_receipt(&self, record: &ReceiptRecord) -> Result<PersistedReceipt, StoreError>;

    /// Fetch a persisted receipt by its external receipt identifier.
    async fn get_receipt(&self, receipt_id: &str) -> Result<Option<PersistedReceipt>, StoreError>;
}

pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
