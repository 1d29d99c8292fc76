//! Field normalization: the first pass over every raw receipt body.
//!
//! Callers send field names in arbitrary case (`RECEIPT_ID`, `Receipt_Id`,
//! `receipt_id`), categories as JSON arrays, JSON-encoded strings, or plain
//! strings, and prices as numbers or numeric strings. This module collapses
//! all of that into a typed [`NormalizedReceipt`] before any business logic
//! runs, and collects every input validation failure in a single pass so the
//! caller sees all invalid fields at once.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{CategoryValue, NormalizedReceipt};

/// Maximum category hierarchy depth retained from caller input.
const MAX_CATEGORY_LEVELS: usize = 3;

/// A single invalid input field: path, human message, machine code.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: &'static str,
}

/// Validation failure carrying every invalid field found in the request.
#[derive(Debug, Error)]
#[error("invalid receipt input ({} field error(s))", .errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn push(&mut self, field: &str, message: impl Into<String>, code: &'static str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
            code,
        });
    }
}

/// Collapse all key variants to a single lowercase canonical key.
///
/// Precedence when variants collide: a key already spelled in canonical
/// lowercase always wins over alternate-cased variants; among alternate
/// casings only, the first key in the map's (deterministic, sorted)
/// iteration order wins.
pub fn canonicalize_keys(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut out: Map<String, Value> = Map::new();
    for (key, value) in raw {
        let canonical = key.to_lowercase();
        let is_canonical_spelling = *key == canonical;
        match out.get(&canonical) {
            None => {
                out.insert(canonical, value.clone());
            }
            Some(_) if is_canonical_spelling => {
                // Canonical spelling displaces whatever variant landed first.
                out.insert(canonical, value.clone());
            }
            Some(_) => {}
        }
    }
    out
}

/// Normalize a raw JSON body into a [`NormalizedReceipt`].
///
/// Returns a [`ValidationError`] listing every invalid field when the body
/// is not an object, the required `receipt_id` is missing/empty, a supplied
/// `product_image_url` is not a valid URL, or a supplied `created_at` is not
/// a recognizable ISO-8601 timestamp. Price and category oddities never
/// error: an unparseable price becomes null, an unparseable bracketed
/// category string is retained as-is.
pub fn normalize(raw: &Value) -> Result<NormalizedReceipt, ValidationError> {
    let mut err = ValidationError::new();

    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => {
            err.push("body", "request body must be a JSON object", "invalid_body");
            return Err(err);
        }
    };

    let fields = canonicalize_keys(obj);

    let receipt_id = match string_field(&fields, "receipt_id") {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            err.push(
                "receipt_id",
                "receipt_id is required and must be a non-empty string",
                "required",
            );
            String::new()
        }
    };

    let product_image_url = string_field(&fields, "product_image_url");
    if let Some(ref url) = product_image_url {
        if !url.trim().is_empty() && reqwest::Url::parse(url).is_err() {
            err.push(
                "product_image_url",
                format!("'{}' is not a valid URL", url),
                "invalid_url",
            );
        }
    }

    let created_at = string_field(&fields, "created_at");
    if let Some(ref ts) = created_at {
        if !ts.trim().is_empty() && !is_valid_timestamp(ts) {
            err.push(
                "created_at",
                format!("'{}' is not a valid ISO-8601 timestamp", ts),
                "invalid_timestamp",
            );
        }
    }

    if !err.errors.is_empty() {
        return Err(err);
    }

    Ok(NormalizedReceipt {
        receipt_id,
        product_id: string_field(&fields, "product_id"),
        created_at,
        merchant_name: string_field(&fields, "merchant_name"),
        product_description: string_field(&fields, "product_description"),
        brand: string_field(&fields, "brand"),
        product_category: parse_category(fields.get("product_category")),
        total_price: parse_price(fields.get("total_price")),
        product_code: string_field(&fields, "product_code"),
        product_image_url,
    })
}

/// Read a string-typed field. Non-string values (numbers, booleans,
/// objects) are treated as absent rather than coerced.
fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Parse the heterogeneous category representations.
///
/// - Real JSON array of strings → `List` (defensive copy, capped at 3 levels)
/// - String starting with `[` after trim → attempt JSON parse; on failure
///   the original string is retained unchanged, no error raised
/// - Plain string → `Text`, passed through unchanged
/// - Null/absent → `None`
pub fn parse_category(value: Option<&Value>) -> Option<CategoryValue> {
    match value? {
        Value::Null => None,
        Value::Array(items) => {
            let strings: Vec<String> = items
                .iter()
                .map(|v| v.as_str().map(|s| s.to_string()))
                .collect::<Option<Vec<_>>>()?;
            Some(CategoryValue::List(cap_levels(strings)))
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') {
                match serde_json::from_str::<Vec<String>>(trimmed) {
                    Ok(parsed) => Some(CategoryValue::List(cap_levels(parsed))),
                    Err(_) => Some(CategoryValue::Text(s.clone())),
                }
            } else {
                Some(CategoryValue::Text(s.clone()))
            }
        }
        _ => None,
    }
}

fn cap_levels(mut items: Vec<String>) -> Vec<String> {
    items.truncate(MAX_CATEGORY_LEVELS);
    items
}

/// Coerce native numeric or numeric-string prices to `f64`.
///
/// A value that fails numeric conversion becomes `None` — never zero and
/// never an error.
pub fn parse_price(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates.
fn is_valid_timestamp(value: &str) -> bool {
    let v = value.trim();
    chrono::DateTime::parse_from_rfc3339(v).is_ok()
        || chrono::NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_lowercase_key_wins_over_variants() {
        let raw = json!({"RECEIPT_ID": "upper", "receipt_id": "lower"});
        let out = canonicalize_keys(raw.as_object().unwrap());
        assert_eq!(out.get("receipt_id").unwrap(), "lower");
    }

    #[test]
    fn first_variant_wins_when_no_canonical_spelling() {
        // serde_json maps iterate in sorted key order, so "RECEIPT_ID"
        // (uppercase sorts first) is the first-seen variant.
        let raw = json!({"Receipt_Id": "b", "RECEIPT_ID": "a"});
        let out = canonicalize_keys(raw.as_object().unwrap());
        assert_eq!(out.get("receipt_id").unwrap(), "a");
    }

    #[test]
    fn normalization_is_idempotent_on_canonical_input() {
        let raw = json!({
            "receipt_id": "R1",
            "merchant_name": "Apple Store",
            "product_category": ["Electronics", "Phones"],
            "total_price": 99.99
        });
        let once = normalize(&raw).unwrap();
        // Re-serialize the canonical form and normalize again.
        let again = json!({
            "receipt_id": once.receipt_id,
            "merchant_name": once.merchant_name,
            "product_category": ["Electronics", "Phones"],
            "total_price": once.total_price
        });
        let twice = normalize(&again).unwrap();
        assert_eq!(once.receipt_id, twice.receipt_id);
        assert_eq!(once.merchant_name, twice.merchant_name);
        assert_eq!(once.product_category, twice.product_category);
        assert_eq!(once.total_price, twice.total_price);
    }

    #[test]
    fn any_consistent_casing_yields_identical_record() {
        let lower = json!({"receipt_id": "R1", "brand": "Apple", "total_price": "5.00"});
        let upper = json!({"RECEIPT_ID": "R1", "BRAND": "Apple", "TOTAL_PRICE": "5.00"});
        let a = normalize(&lower).unwrap();
        let b = normalize(&upper).unwrap();
        assert_eq!(a.receipt_id, b.receipt_id);
        assert_eq!(a.brand, b.brand);
        assert_eq!(a.total_price, b.total_price);
    }

    #[test]
    fn category_json_string_round_trips() {
        let encoded = serde_json::to_string(&vec!["A", "B", "C"]).unwrap();
        let parsed = parse_category(Some(&Value::String(encoded)));
        assert_eq!(
            parsed,
            Some(CategoryValue::List(vec![
                "A".into(),
                "B".into(),
                "C".into()
            ]))
        );
    }

    #[test]
    fn malformed_bracketed_category_is_kept_as_string() {
        let parsed = parse_category(Some(&json!("[\"A\",\"B\"")));
        assert_eq!(parsed, Some(CategoryValue::Text("[\"A\",\"B\"".into())));
    }

    #[test]
    fn plain_category_string_passes_through() {
        let parsed = parse_category(Some(&json!("Groceries")));
        assert_eq!(parsed, Some(CategoryValue::Text("Groceries".into())));
    }

    #[test]
    fn null_category_propagates() {
        assert_eq!(parse_category(Some(&Value::Null)), None);
        assert_eq!(parse_category(None), None);
    }

    #[test]
    fn category_deeper_than_three_levels_is_capped() {
        let parsed = parse_category(Some(&json!(["A", "B", "C", "D"])));
        assert_eq!(
            parsed,
            Some(CategoryValue::List(vec![
                "A".into(),
                "B".into(),
                "C".into()
            ]))
        );
    }

    #[test]
    fn price_string_and_number_agree() {
        assert_eq!(parse_price(Some(&json!("99.99"))), Some(99.99));
        assert_eq!(parse_price(Some(&json!(99.99))), Some(99.99));
    }

    #[test]
    fn unparseable_price_becomes_null() {
        assert_eq!(parse_price(Some(&json!("not-a-number"))), None);
        assert_eq!(parse_price(Some(&json!("NaN"))), None);
        assert_eq!(parse_price(Some(&json!(true))), None);
    }

    #[test]
    fn missing_receipt_id_is_rejected() {
        let err = normalize(&json!({"merchant_name": "Target"})).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "receipt_id");
        assert_eq!(err.errors[0].code, "required");
    }

    #[test]
    fn all_invalid_fields_are_reported_together() {
        let err = normalize(&json!({
            "product_image_url": "not a url",
            "created_at": "yesterday"
        }))
        .unwrap_err();
        let fields: Vec<&str> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(err.errors.len(), 3);
        assert!(fields.contains(&"receipt_id"));
        assert!(fields.contains(&"product_image_url"));
        assert!(fields.contains(&"created_at"));
    }

    #[test]
    fn valid_timestamps_are_accepted() {
        let ok = normalize(&json!({
            "receipt_id": "R1",
            "created_at": "2024-06-01T12:30:00Z"
        }));
        assert!(ok.is_ok());
        let ok = normalize(&json!({"receipt_id": "R1", "created_at": "2024-06-01"}));
        assert!(ok.is_ok());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = normalize(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.errors[0].code, "invalid_body");
    }
}
