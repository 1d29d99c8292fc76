//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one receipt: normalization → enrichment
//! decision → reconciliation → persistence. The HTTP server and the CLI
//! `ingest` command both go through [`normalize_and_reconcile`], so the two
//! surfaces cannot drift apart.

use anyhow::Result;
use serde_json::Value;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::enrichment::{self, EnrichmentClient};
use crate::models::{EnrichmentResult, ReceiptRecord};
use crate::normalize::{normalize, ValidationError};
use crate::reconcile::reconcile;
use crate::store::sqlite::SqliteStore;
use crate::store::{ReceiptStore, StoreError};

/// Normalize a raw request body and reconcile it into a record ready for
/// insertion.
///
/// Fails only on truly malformed input (missing identifier, invalid URL or
/// timestamp) — never on enrichment failure, which is absorbed into the
/// degraded fallback by the reconciliation engine.
pub async fn normalize_and_reconcile(
    raw: &Value,
    force_enrichment: bool,
    client: &dyn EnrichmentClient,
) -> Result<(ReceiptRecord, Option<EnrichmentResult>), ValidationError> {
    let normalized = normalize(raw)?;
    Ok(reconcile(&normalized, force_enrichment, client).await)
}

/// CLI entry point: ingest one record or an array of records from a JSON
/// file.
pub async fn run_ingest(config: &Config, file: &Path, force_enrichment: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let parsed: Value = serde_json::from_str(&content)?;

    let records: Vec<Value> = match parsed {
        Value::Array(items) => items,
        other => vec![other],
    };

    let client = enrichment::create_client(&config.enrichment)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let mut persisted = 0u64;
    let mut invalid = 0u64;
    let mut conflicts = 0u64;
    let mut enriched = 0u64;

    for raw in &records {
        match normalize_and_reconcile(raw, force_enrichment, client.as_ref()).await {
            Ok((record, enrichment_result)) => {
                if enrichment_result.is_some() {
                    enriched += 1;
                }
                match store.insert_receipt(&record).await {
                    Ok(_) => persisted += 1,
                    Err(StoreError::Conflict { receipt_id }) => {
                        eprintln!("Warning: duplicate receipt_id skipped: {}", receipt_id);
                        conflicts += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => {
                for field_error in &e.errors {
                    eprintln!(
                        "Warning: invalid record: {}: {}",
                        field_error.field, field_error.message
                    );
                }
                invalid += 1;
            }
        }
    }

    println!("ingest {}", file.display());
    println!("  records: {}", records.len());
    println!("  persisted: {}", persisted);
    println!("  enrichment attempted: {}", enriched);
    println!("  invalid: {}", invalid);
    println!("  conflicts: {}", conflicts);
    println!("ok");

    Ok(())
}
