//! Receipt retrieval by external identifier.
//!
//! Fetches a persisted receipt from the store. Used by the `rcpt get` CLI
//! command; the HTTP server goes through the store directly.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store::sqlite::SqliteStore;
use crate::store::ReceiptStore;

/// CLI entry point — fetches a receipt and prints it to stdout.
pub async fn run_get(config: &Config, receipt_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let receipt = match store.get_receipt(receipt_id).await? {
        Some(r) => r,
        None => {
            eprintln!("Error: receipt not found: {}", receipt_id);
            std::process::exit(1);
        }
    };

    let rec = &receipt.record;

    println!("--- Receipt ---");
    println!("id:            {}", receipt.id);
    println!("receipt_id:    {}", rec.receipt_id);
    if let Some(ref product_id) = rec.product_id {
        println!("product_id:    {}", product_id);
    }
    if let Some(ref ts) = rec.created_at {
        println!("created_at:    {}", ts);
    }
    println!(
        "merchant:      {}",
        rec.merchant_name.as_deref().unwrap_or("(unknown)")
    );
    if let Some(ref description) = rec.product_description {
        println!("description:   {}", description);
    }
    println!(
        "brand:         {}",
        rec.brand.as_deref().unwrap_or("(none)")
    );
    if let Some(ref category) = rec.product_category {
        println!("category:      {}", category.to_storage());
    }
    if let Some(price) = rec.total_price {
        println!("total_price:   {:.2}", price);
    }
    if let Some(ref code) = rec.product_code {
        println!("product_code:  {}", code);
    }
    if let Some(ref url) = rec.product_image_url {
        println!("image_url:     {}", url);
    }
    println!("ingested_at:   {}", receipt.ingested_at);
    println!("updated_at:    {}", receipt.updated_at);
    println!();

    println!("--- Enrichment ---");
    match rec.enrichment_confidence {
        Some(confidence) => {
            println!("confidence:    {}", confidence.as_str());
            println!(
                "brand:         {}",
                rec.enriched_brand.as_deref().unwrap_or("(none)")
            );
            if let Some(ref category) = rec.enriched_category {
                println!("category:      {}", category.join(" > "));
            }
            if let Some(ref upc) = rec.enriched_upc {
                println!("upc:           {}", upc);
            }
            if let Some(ref size) = rec.enriched_size {
                println!("size:          {}", size);
            }
            if let Some(ref color) = rec.enriched_color {
                println!("color:         {}", color);
            }
            if let Some(ref material) = rec.enriched_material {
                println!("material:      {}", material);
            }
            if let Some(ref model) = rec.enriched_model {
                println!("model:         {}", model);
            }
            if let Some(ref weight) = rec.enriched_weight {
                println!("weight:        {}", weight);
            }
        }
        None => println!("(not attempted)"),
    }

    Ok(())
}
