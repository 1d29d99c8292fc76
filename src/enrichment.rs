//! Enrichment provider abstraction and implementations.
//!
//! Defines the [`EnrichmentClient`] trait and concrete implementations:
//! - **[`DisabledClient`]** — returns errors; used when enrichment is not
//!   configured. Every ingest then takes the degraded-fallback path.
//! - **[`OpenAiClient`]** — calls the OpenAI chat completions API with retry
//!   and backoff.
//! - **[`OllamaClient`]** — calls a local Ollama instance's `/api/generate`
//!   endpoint.
//!
//! The client returns raw text; [`parse_enrichment`] strips an optional
//! markdown code fence and validates the JSON against the
//! [`EnrichmentResult`] schema. [`run_enrichment`] wraps the whole exchange
//! into an [`EnrichmentOutcome`] that distinguishes `Success` from
//! `Degraded` explicitly — enrichment failure is data, not an exception,
//! and must never fail receipt ingestion.
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama clients use exponential backoff for transient
//! errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EnrichmentConfig;
use crate::models::EnrichmentResult;

/// The fields handed to the enrichment model for one receipt line item.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub description: String,
    pub merchant: Option<String>,
    pub existing_brand: Option<String>,
    pub existing_product_code: Option<String>,
}

/// Trait for enrichment providers.
///
/// A provider turns an [`EnrichmentRequest`] into raw model text. Parsing
/// and schema validation happen in [`parse_enrichment`], so providers stay
/// transport-only.
#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    /// Returns the provider identifier (e.g. `"openai"`).
    fn provider_name(&self) -> &str;

    /// Generate the structured-enrichment response text for one request.
    async fn generate_structured_enrichment(&self, request: &EnrichmentRequest) -> Result<String>;
}

/// Outcome of one enrichment attempt.
///
/// `Degraded` carries the safe substitute result alongside the reason, so
/// the reconciliation engine consumes both arms uniformly via
/// [`EnrichmentOutcome::result`].
#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    Success(EnrichmentResult),
    Degraded {
        reason: String,
        result: EnrichmentResult,
    },
}

impl EnrichmentOutcome {
    pub fn result(&self) -> &EnrichmentResult {
        match self {
            Self::Success(r) => r,
            Self::Degraded { result, .. } => result,
        }
    }

    pub fn into_result(self) -> EnrichmentResult {
        match self {
            Self::Success(r) => r,
            Self::Degraded { result, .. } => result,
        }
    }
}

/// Run one enrichment exchange end to end: call the provider, strip the
/// code fence, validate the schema.
///
/// Never returns an error. Transport failures, timeouts, malformed JSON,
/// and schema violations all collapse into `Degraded` with the existing
/// brand (when present) carried through and confidence `low`. The failure
/// is logged here and nowhere else.
pub async fn run_enrichment(
    client: &dyn EnrichmentClient,
    request: &EnrichmentRequest,
) -> EnrichmentOutcome {
    let raw = match client.generate_structured_enrichment(request).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(
                provider = client.provider_name(),
                error = %e,
                "enrichment call failed, using degraded fallback"
            );
            return EnrichmentOutcome::Degraded {
                reason: e.to_string(),
                result: EnrichmentResult::degraded(request.existing_brand.as_deref()),
            };
        }
    };

    match parse_enrichment(&raw) {
        Ok(result) => EnrichmentOutcome::Success(result),
        Err(e) => {
            tracing::warn!(
                provider = client.provider_name(),
                error = %e,
                "enrichment response failed validation, using degraded fallback"
            );
            EnrichmentOutcome::Degraded {
                reason: e.to_string(),
                result: EnrichmentResult::degraded(request.existing_brand.as_deref()),
            }
        }
    }
}

/// Parse and validate a raw enrichment response.
///
/// The response may be wrapped in a markdown code fence
/// (```` ```json ... ``` ````); if no fence is present the whole response
/// is treated as candidate JSON. The parsed value must satisfy the
/// [`EnrichmentResult`] schema with a non-empty category list.
pub fn parse_enrichment(raw: &str) -> Result<EnrichmentResult> {
    let candidate = strip_code_fence(raw);

    let mut result: EnrichmentResult = serde_json::from_str(candidate)
        .map_err(|e| anyhow!("enrichment response is not valid JSON for the expected schema: {}", e))?;

    if result.category.is_empty() {
        bail!("enrichment response category must be a non-empty list");
    }
    result.category.truncate(3);

    Ok(result)
}

/// Strip a markdown code fence from a model response.
///
/// Handles ```` ```json ```` and bare ```` ``` ```` fences; unfenced input
/// passes through unchanged.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Build the instruction prompt for one request.
fn build_prompt(request: &EnrichmentRequest) -> String {
    let mut prompt = String::from(
        "Identify product attributes from a retail receipt line item. \
         Respond with a single JSON object and nothing else, using exactly \
         these keys: brand (string), category (array of 1-3 strings, most \
         general level first), upc (12-digit numeric string or null), size, \
         color, material, model, weight (string or null), confidence (one \
         of \"high\", \"medium\", \"low\"). Use \"unknown\" for brand or \
         category values you cannot determine.\n\n",
    );
    prompt.push_str(&format!("Product description: {}\n", request.description));
    if let Some(ref merchant) = request.merchant {
        prompt.push_str(&format!("Merchant: {}\n", merchant));
    }
    if let Some(ref brand) = request.existing_brand {
        prompt.push_str(&format!("Known brand: {}\n", brand));
    }
    if let Some(ref code) = request.existing_product_code {
        prompt.push_str(&format!("Product code: {}\n", code));
    }
    prompt
}

// ============ Disabled Client ============

/// A no-op enrichment client that always returns errors.
///
/// Used when `enrichment.provider = "disabled"` in the configuration. Every
/// enrichment attempt then degrades, so ingestion keeps working with
/// `unknown`/`low` placeholders.
pub struct DisabledClient;

#[async_trait]
impl EnrichmentClient for DisabledClient {
    fn provider_name(&self) -> &str {
        "disabled"
    }

    async fn generate_structured_enrichment(&self, _request: &EnrichmentRequest) -> Result<String> {
        bail!("Enrichment provider is disabled")
    }
}

// ============ OpenAI Client ============

/// Enrichment client using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiClient {
    model: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl OpenAiClient {
    /// Create a new OpenAI client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("enrichment.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EnrichmentClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn generate_structured_enrichment(&self, request: &EnrichmentRequest) -> Result<String> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": build_prompt(request) }
            ],
            "temperature": 0,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return extract_openai_content(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Enrichment failed after retries")))
    }
}

/// Extract the assistant message text from a chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama Client ============

/// Enrichment client using a local Ollama instance.
///
/// Calls `POST /api/generate` on the configured Ollama URL (default:
/// `http://localhost:11434`).
pub struct OllamaClient {
    model: String,
    url: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("enrichment.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            url,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EnrichmentClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn generate_structured_enrichment(&self, request: &EnrichmentRequest) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(request),
            "stream": false,
            "format": "json",
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/generate", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return json
                            .get("response")
                            .and_then(|r| r.as_str())
                            .map(|s| s.to_string())
                            .ok_or_else(|| {
                                anyhow!("Invalid Ollama response: missing response field")
                            });
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("Ollama API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Ollama enrichment failed after retries")))
    }
}

/// Create the appropriate [`EnrichmentClient`] based on configuration.
///
/// | Config Value | Client |
/// |-------------|--------|
/// | `"disabled"` | [`DisabledClient`] |
/// | `"openai"` | [`OpenAiClient`] |
/// | `"ollama"` | [`OllamaClient`] |
///
/// # Errors
///
/// Returns an error for unknown provider names or if the provider cannot
/// be initialized (missing config or API key).
pub fn create_client(config: &EnrichmentConfig) -> Result<Box<dyn EnrichmentClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledClient)),
        "openai" => Ok(Box::new(OpenAiClient::new(config)?)),
        "ollama" => Ok(Box::new(OllamaClient::new(config)?)),
        other => bail!("Unknown enrichment provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;

    const VALID: &str = r#"{
        "brand": "Apple",
        "category": ["Electronics", "Phones"],
        "upc": "194253101234",
        "size": null,
        "color": "Natural Titanium",
        "material": null,
        "model": "iPhone 15 Pro",
        "weight": null,
        "confidence": "high"
    }"#;

    fn request() -> EnrichmentRequest {
        EnrichmentRequest {
            description: "iPhone 15 Pro".into(),
            merchant: Some("Apple Store".into()),
            existing_brand: None,
            existing_product_code: None,
        }
    }

    #[test]
    fn strips_json_fence() {
        let fenced = format!("```json\n{}\n```", VALID);
        assert_eq!(strip_code_fence(&fenced), VALID.trim());
    }

    #[test]
    fn strips_bare_fence() {
        let fenced = format!("```\n{}\n```", VALID);
        assert_eq!(strip_code_fence(&fenced), VALID.trim());
    }

    #[test]
    fn unfenced_passes_through() {
        assert_eq!(strip_code_fence(VALID), VALID.trim());
    }

    #[test]
    fn parses_valid_response() {
        let result = parse_enrichment(VALID).unwrap();
        assert_eq!(result.brand, "Apple");
        assert_eq!(result.category, vec!["Electronics", "Phones"]);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.model.as_deref(), Some("iPhone 15 Pro"));
    }

    #[test]
    fn parses_fenced_response() {
        let fenced = format!("```json\n{}\n```", VALID);
        let result = parse_enrichment(&fenced).unwrap();
        assert_eq!(result.brand, "Apple");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_enrichment("this is not json").is_err());
        assert!(parse_enrichment("{\"brand\": \"Apple\"").is_err());
    }

    #[test]
    fn rejects_schema_violations() {
        // Missing confidence
        assert!(parse_enrichment(r#"{"brand":"A","category":["B"]}"#).is_err());
        // Invalid confidence value
        assert!(
            parse_enrichment(r#"{"brand":"A","category":["B"],"confidence":"certain"}"#).is_err()
        );
        // Empty category
        assert!(parse_enrichment(r#"{"brand":"A","category":[],"confidence":"high"}"#).is_err());
    }

    #[test]
    fn category_is_capped_at_three_levels() {
        let result = parse_enrichment(
            r#"{"brand":"A","category":["1","2","3","4"],"confidence":"medium"}"#,
        )
        .unwrap();
        assert_eq!(result.category.len(), 3);
    }

    struct FailingClient;

    #[async_trait]
    impl EnrichmentClient for FailingClient {
        fn provider_name(&self) -> &str {
            "failing"
        }
        async fn generate_structured_enrichment(
            &self,
            _request: &EnrichmentRequest,
        ) -> Result<String> {
            bail!("simulated network error")
        }
    }

    struct MalformedClient;

    #[async_trait]
    impl EnrichmentClient for MalformedClient {
        fn provider_name(&self) -> &str {
            "malformed"
        }
        async fn generate_structured_enrichment(
            &self,
            _request: &EnrichmentRequest,
        ) -> Result<String> {
            Ok("```json\n{\"oops\"\n```".to_string())
        }
    }

    #[tokio::test]
    async fn transport_failure_degrades() {
        let outcome = run_enrichment(&FailingClient, &request()).await;
        match outcome {
            EnrichmentOutcome::Degraded { ref result, .. } => {
                assert_eq!(result.confidence, Confidence::Low);
                assert_eq!(result.brand, "unknown");
                assert_eq!(result.category, vec!["unknown"]);
            }
            EnrichmentOutcome::Success(_) => panic!("expected degraded outcome"),
        }
    }

    #[tokio::test]
    async fn malformed_response_degrades_with_existing_brand() {
        let mut req = request();
        req.existing_brand = Some("Apple".into());
        let outcome = run_enrichment(&MalformedClient, &req).await;
        match outcome {
            EnrichmentOutcome::Degraded { ref result, .. } => {
                assert_eq!(result.brand, "Apple");
                assert_eq!(result.confidence, Confidence::Low);
            }
            EnrichmentOutcome::Success(_) => panic!("expected degraded outcome"),
        }
    }

    #[tokio::test]
    async fn disabled_client_always_degrades() {
        let outcome = run_enrichment(&DisabledClient, &request()).await;
        assert!(matches!(outcome, EnrichmentOutcome::Degraded { .. }));
    }
}
