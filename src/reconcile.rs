//! Merge/reconciliation engine.
//!
//! The decision core of the service: decides whether a normalized receipt
//! needs enrichment, runs the enrichment exchange when it does, and
//! reconciles the enriched fields against caller-supplied fields under the
//! confidence tiers. The engine is a pure function of its inputs plus the
//! one enrichment call — it holds no state, takes its collaborator as a
//! parameter, and never fails: enrichment trouble ends in the degraded
//! fallback, not an error.
//!
//! # Reconciliation rules
//!
//! Applied independently per field:
//! - **brand** — adopt the enriched brand only if the existing brand is
//!   missing OR the enrichment confidence is `high`, and only if the
//!   enriched brand is not the `"unknown"` sentinel.
//! - **category** — same gate, and only if the enriched category is
//!   non-empty with a first element other than `"unknown"`.
//! - **detail fields** (UPC, size, color, material, model, weight) — sourced
//!   purely from enrichment output, null when absent.
//! - **`enriched_brand`** — always the standardized form of whichever brand
//!   is relevant: `standardize_brand(enrichment.brand)` when enrichment ran,
//!   `standardize_brand(existing brand)` when it did not.

use crate::enrichment::{run_enrichment, EnrichmentClient, EnrichmentOutcome, EnrichmentRequest};
use crate::models::{
    CategoryValue, Confidence, EnrichmentResult, NormalizedReceipt, ReceiptRecord,
};
use crate::standardize::{standardize_brand, standardize_merchant};

/// Decide whether the enrichment client should be invoked.
///
/// Invoke if and only if a product description is present AND at least one
/// of: `force` is set, the brand is missing, or the category is
/// missing/empty.
pub fn needs_enrichment(input: &NormalizedReceipt, force: bool) -> bool {
    let has_description = input
        .product_description
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());

    has_description && (force || input.brand_missing() || input.category_missing())
}

/// Reconcile a normalized receipt into the final record, invoking the
/// enrichment client when [`needs_enrichment`] says so.
///
/// Returns the merged record plus the enrichment result when enrichment was
/// attempted (degraded results included). Infallible by design.
pub async fn reconcile(
    input: &NormalizedReceipt,
    force: bool,
    client: &dyn EnrichmentClient,
) -> (ReceiptRecord, Option<EnrichmentResult>) {
    if !needs_enrichment(input, force) {
        return (skipped_record(input), None);
    }

    let request = EnrichmentRequest {
        description: input
            .product_description
            .clone()
            .unwrap_or_default(),
        merchant: standardize_merchant(input.merchant_name.as_deref()),
        existing_brand: input.brand.clone(),
        existing_product_code: input.product_code.clone(),
    };

    let outcome = run_enrichment(client, &request).await;
    if let EnrichmentOutcome::Degraded { ref reason, .. } = outcome {
        tracing::debug!(receipt_id = %input.receipt_id, reason = %reason, "enrichment degraded");
    }
    let enrichment = outcome.into_result();

    let record = merge(input, &enrichment);
    (record, Some(enrichment))
}

/// Merge one enrichment result into the normalized input.
fn merge(input: &NormalizedReceipt, enrichment: &EnrichmentResult) -> ReceiptRecord {
    let high = enrichment.confidence == Confidence::High;

    let brand = if (input.brand_missing() || high) && !enrichment.brand_is_unknown() {
        Some(enrichment.brand.clone())
    } else {
        input.brand.clone()
    };

    let product_category = if (input.category_missing() || high)
        && !enrichment.category.is_empty()
        && !enrichment.category_is_unknown()
    {
        Some(CategoryValue::List(enrichment.category.clone()))
    } else {
        input.product_category.clone()
    };

    ReceiptRecord {
        receipt_id: input.receipt_id.clone(),
        product_id: input.product_id.clone(),
        created_at: input.created_at.clone(),
        merchant_name: input.merchant_name.clone(),
        product_description: input.product_description.clone(),
        brand,
        product_category,
        total_price: input.total_price,
        product_code: input.product_code.clone(),
        product_image_url: input.product_image_url.clone(),

        enriched_brand: standardize_brand(Some(enrichment.brand.as_str())),
        enriched_category: Some(enrichment.category.clone()),
        enriched_upc: enrichment.upc.clone(),
        enriched_size: enrichment.size.clone(),
        enriched_color: enrichment.color.clone(),
        enriched_material: enrichment.material.clone(),
        enriched_model: enrichment.model.clone(),
        enriched_weight: enrichment.weight.clone(),
        enrichment_confidence: Some(enrichment.confidence),
    }
}

/// Build the record for the enrichment-skipped path: caller fields pass
/// through, detail fields stay null, and `enriched_brand` still gets the
/// standardizer applied to the existing brand.
fn skipped_record(input: &NormalizedReceipt) -> ReceiptRecord {
    ReceiptRecord {
        receipt_id: input.receipt_id.clone(),
        product_id: input.product_id.clone(),
        created_at: input.created_at.clone(),
        merchant_name: input.merchant_name.clone(),
        product_description: input.product_description.clone(),
        brand: input.brand.clone(),
        product_category: input.product_category.clone(),
        total_price: input.total_price,
        product_code: input.product_code.clone(),
        product_image_url: input.product_image_url.clone(),

        enriched_brand: standardize_brand(input.brand.as_deref()),
        enriched_category: None,
        enriched_upc: None,
        enriched_size: None,
        enriched_color: None,
        enriched_material: None,
        enriched_model: None,
        enriched_weight: None,
        enrichment_confidence: None,
    }
}
