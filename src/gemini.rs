//! Google Gemini client for product row extraction
//!
//! Sends the extraction prompt with a JSON response schema and returns the
//! parsed rows. Only `generateContent` is used; there is no streaming.

use crate::error::ExtractError;
use crate::extraction::{self, ProductRow};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

/// Property order requested from the model.
pub const ROW_FIELDS: [&str; 6] = ["produto", "descricao", "um", "quantidade", "precoVenda", "total"];

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiResponseCandidate>,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Array of six-string-field objects, in `ROW_FIELDS` order.
fn row_schema() -> Value {
    let properties: serde_json::Map<String, Value> = ROW_FIELDS
        .iter()
        .map(|field| (field.to_string(), json!({ "type": "STRING" })))
        .collect();

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "propertyOrdering": ROW_FIELDS,
        }
    })
}

fn build_request(prompt: &str) -> GeminiRequest<'_> {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts: vec![GeminiPart { text: prompt }],
        }],
        generation_config: GeminiGenerationConfig {
            response_mime_type: "application/json",
            response_schema: row_schema(),
        },
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(base_url: Url, model: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            model: model.into(),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        )
    }

    /// Ask the model for product rows found in `prompt`.
    pub async fn generate_rows(&self, prompt: &str) -> Result<Vec<ProductRow>, ExtractError> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&build_request(prompt))
            .send()
            .await
            .map_err(ExtractError::http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::GeminiStatus { status, body });
        }

        let envelope: GeminiResponse = response.json().await.map_err(ExtractError::http)?;
        let text = envelope.into_text().ok_or(ExtractError::EmptyResponse)?;
        tracing::debug!(model = %self.model, chars = text.len(), "Gemini response received");

        extraction::parse_rows(&text)
    }
}
