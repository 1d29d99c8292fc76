use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Create receipts table. receipt_id is the external identifier and the
    // uniqueness anchor; id is the internal row key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS receipts (
            id TEXT PRIMARY KEY,
            receipt_id TEXT NOT NULL UNIQUE,
            product_id TEXT,
            created_at TEXT,
            merchant_name TEXT,
            product_description TEXT,
            brand TEXT,
            product_category TEXT,
            total_price REAL,
            product_code TEXT,
            product_image_url TEXT,
            enriched_brand TEXT,
            enriched_category TEXT,
            enriched_upc TEXT,
            enriched_size TEXT,
            enriched_color TEXT,
            enriched_material TEXT,
            enriched_model TEXT,
            enriched_weight TEXT,
            enrichment_confidence TEXT,
            ingested_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_receipts_merchant ON receipts(merchant_name)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_receipts_ingested_at ON receipts(ingested_at DESC)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
