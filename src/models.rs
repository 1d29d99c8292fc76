//! Core data models used throughout Receipt Harness.
//!
//! These types represent the receipt records that flow through the
//! normalization, enrichment, and reconciliation pipeline.

use serde::{Deserialize, Serialize};

/// Sentinel value the enrichment model uses for fields it cannot determine.
pub const UNKNOWN_SENTINEL: &str = "unknown";

/// Coarse trust label attached to an enrichment result.
///
/// Governs whether enriched values may override caller-supplied data:
/// only `High` confidence displaces an existing brand or category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown confidence tier: {}", other)),
        }
    }
}

/// A product category value after normalization.
///
/// Callers send categories as a real JSON array, a JSON-encoded string
/// (`"[\"A\",\"B\"]"`), or a plain string. The normalizer resolves the
/// first two into `List`; a plain (or unparseable bracketed) string is
/// retained as `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryValue {
    List(Vec<String>),
    Text(String),
}

impl CategoryValue {
    /// A category counts as missing when it is an empty list or an
    /// empty/whitespace-only string. Drives the enrichment decision.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    /// Storage form: JSON array text for lists, the raw string for text.
    pub fn to_storage(&self) -> String {
        match self {
            Self::List(items) => serde_json::to_string(items).unwrap_or_default(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Inverse of [`to_storage`](Self::to_storage): a stored value that
    /// parses as a JSON string array comes back as `List`, anything else
    /// as `Text`.
    pub fn from_storage(stored: &str) -> Self {
        let trimmed = stored.trim();
        if trimmed.starts_with('[') {
            if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
                return Self::List(items);
            }
        }
        Self::Text(stored.to_string())
    }
}

/// Canonical receipt record produced by the normalizer.
///
/// All keys have been collapsed to canonical lowercase, the category has
/// been parsed, and the price coerced. This is the only input shape the
/// reconciliation engine accepts — raw request maps never reach it.
#[derive(Debug, Clone, Default)]
pub struct NormalizedReceipt {
    pub receipt_id: String,
    pub product_id: Option<String>,
    /// Caller-supplied receipt timestamp (validated ISO-8601), distinct
    /// from the gateway-assigned `ingested_at`/`updated_at`.
    pub created_at: Option<String>,
    pub merchant_name: Option<String>,
    pub product_description: Option<String>,
    pub brand: Option<String>,
    pub product_category: Option<CategoryValue>,
    pub total_price: Option<f64>,
    pub product_code: Option<String>,
    pub product_image_url: Option<String>,
}

impl NormalizedReceipt {
    pub fn brand_missing(&self) -> bool {
        self.brand.as_deref().is_none_or(|b| b.trim().is_empty())
    }

    pub fn category_missing(&self) -> bool {
        self.product_category.as_ref().is_none_or(|c| c.is_empty())
    }
}

/// Structured candidate record produced by the enrichment client.
///
/// Deserialized from the model's JSON response; the shape doubles as the
/// schema validation required before an enrichment result is trusted.
/// Responses that fail to deserialize are treated identically to a
/// transport failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub brand: String,
    pub category: Vec<String>,
    #[serde(default)]
    pub upc: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    pub confidence: Confidence,
}

impl EnrichmentResult {
    /// The safe substitute produced when the enrichment call fails or
    /// returns invalid data. Enrichment failure must never fail ingestion.
    pub fn degraded(existing_brand: Option<&str>) -> Self {
        Self {
            brand: existing_brand
                .filter(|b| !b.trim().is_empty())
                .unwrap_or(UNKNOWN_SENTINEL)
                .to_string(),
            category: vec![UNKNOWN_SENTINEL.to_string()],
            upc: None,
            size: None,
            color: None,
            material: None,
            model: None,
            weight: None,
            confidence: Confidence::Low,
        }
    }

    pub fn brand_is_unknown(&self) -> bool {
        self.brand.trim().eq_ignore_ascii_case(UNKNOWN_SENTINEL)
    }

    pub fn category_is_unknown(&self) -> bool {
        self.category
            .first()
            .is_none_or(|c| c.trim().eq_ignore_ascii_case(UNKNOWN_SENTINEL))
    }
}

/// The merged record the reconciliation engine hands to the store.
///
/// Union of the normalized input fields and an `enriched_*` copy of every
/// enrichment field. `enriched_*` values are populated whenever enrichment
/// was attempted (placeholders on degradation) and never left stale.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptRecord {
    pub receipt_id: String,
    pub product_id: Option<String>,
    pub created_at: Option<String>,
    pub merchant_name: Option<String>,
    pub product_description: Option<String>,
    pub brand: Option<String>,
    pub product_category: Option<CategoryValue>,
    pub total_price: Option<f64>,
    pub product_code: Option<String>,
    pub product_image_url: Option<String>,

    pub enriched_brand: Option<String>,
    pub enriched_category: Option<Vec<String>>,
    pub enriched_upc: Option<String>,
    pub enriched_size: Option<String>,
    pub enriched_color: Option<String>,
    pub enriched_material: Option<String>,
    pub enriched_model: Option<String>,
    pub enriched_weight: Option<String>,
    pub enrichment_confidence: Option<Confidence>,
}

/// A stored receipt as read back from the persistence gateway, with the
/// gateway-assigned row id and timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct PersistedReceipt {
    pub id: String,
    #[serde(flatten)]
    pub record: ReceiptRecord,
    /// ISO-8601, assigned by the store at insert time.
    pub ingested_at: String,
    pub updated_at: String,
}
