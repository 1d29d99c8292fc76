//! SQLite [`ReceiptStore`] implementation backed by sqlx.
//!
//! The `receipts` table carries a `UNIQUE` index on `receipt_id`; a unique
//! violation on insert maps to [`StoreError::Conflict`], pool/connection
//! failures to [`StoreError::Unavailable`].

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{CategoryValue, Confidence, PersistedReceipt, ReceiptRecord};

use super::{format_ts_iso, ReceiptStore, StoreError};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptStore for SqliteStore {
    async fn insert_receipt(&self, record: &ReceiptRecord) -> Result<PersistedReceipt, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let category_storage = record.product_category.as_ref().map(|c| c.to_storage());
        let enriched_category_storage = record
            .enriched_category
            .as_ref()
            .map(|c| serde_json::to_string(c).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO receipts (
                id, receipt_id, product_id, created_at, merchant_name,
                product_description, brand, product_category, total_price,
                product_code, product_image_url,
                enriched_brand, enriched_category, enriched_upc, enriched_size,
                enriched_color, enriched_material, enriched_model,
                enriched_weight, enrichment_confidence,
                ingested_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&record.receipt_id)
        .bind(&record.product_id)
        .bind(&record.created_at)
        .bind(&record.merchant_name)
        .bind(&record.product_description)
        .bind(&record.brand)
        .bind(&category_storage)
        .bind(record.total_price)
        .bind(&record.product_code)
        .bind(&record.product_image_url)
        .bind(&record.enriched_brand)
        .bind(&enriched_category_storage)
        .bind(&record.enriched_upc)
        .bind(&record.enriched_size)
        .bind(&record.enriched_color)
        .bind(&record.enriched_material)
        .bind(&record.enriched_model)
        .bind(&record.enriched_weight)
        .bind(record.enrichment_confidence.map(|c| c.as_str()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, &record.receipt_id))?;

        Ok(PersistedReceipt {
            id,
            record: record.clone(),
            ingested_at: format_ts_iso(now),
            updated_at: format_ts_iso(now),
        })
    }

    async fn get_receipt(&self, receipt_id: &str) -> Result<Option<PersistedReceipt>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, receipt_id, product_id, created_at, merchant_name,
                   product_description, brand, product_category, total_price,
                   product_code, product_image_url,
                   enriched_brand, enriched_category, enriched_upc,
                   enriched_size, enriched_color, enriched_material,
                   enriched_model, enriched_weight, enrichment_confidence,
                   ingested_at, updated_at
            FROM receipts WHERE receipt_id = ?
            "#,
        )
        .bind(receipt_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, receipt_id))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let product_category: Option<String> = row.get("product_category");
        let enriched_category: Option<String> = row.get("enriched_category");
        let confidence: Option<String> = row.get("enrichment_confidence");
        let ingested_at: i64 = row.get("ingested_at");
        let updated_at: i64 = row.get("updated_at");

        let record = ReceiptRecord {
            receipt_id: row.get("receipt_id"),
            product_id: row.get("product_id"),
            created_at: row.get("created_at"),
            merchant_name: row.get("merchant_name"),
            product_description: row.get("product_description"),
            brand: row.get("brand"),
            product_category: product_category
                .as_deref()
                .map(CategoryValue::from_storage),
            total_price: row.get("total_price"),
            product_code: row.get("product_code"),
            product_image_url: row.get("product_image_url"),
            enriched_brand: row.get("enriched_brand"),
            enriched_category: enriched_category
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            enriched_upc: row.get("enriched_upc"),
            enriched_size: row.get("enriched_size"),
            enriched_color: row.get("enriched_color"),
            enriched_material: row.get("enriched_material"),
            enriched_model: row.get("enriched_model"),
            enriched_weight: row.get("enriched_weight"),
            enrichment_confidence: confidence.and_then(|c| c.parse::<Confidence>().ok()),
        };

        Ok(Some(PersistedReceipt {
            id: row.get("id"),
            record,
            ingested_at: format_ts_iso(ingested_at),
            updated_at: format_ts_iso(updated_at),
        }))
    }
}

fn map_sqlx_error(e: sqlx::Error, receipt_id: &str) -> StoreError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict {
            receipt_id: receipt_id.to_string(),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Other(anyhow::Error::new(other)),
    }
}
