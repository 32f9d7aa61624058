//! Receipt field extraction
//!
//! Sends the downloaded receipt image to an OpenAI-compatible vision model
//! and parses the reply into a [`ReceiptRecord`]. This boundary never fails:
//! an unreachable service or a malformed reply comes back as an all-empty
//! record, which the dialogue engine treats as an unreadable receipt.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::fields::ReceiptRecord;
use crate::media::TempImage;

const EXTRACTION_PROMPT: &str = "You are reading a payment receipt image. Respond with ONLY a \
JSON object, no prose and no markdown, with exactly these keys: \
{\"name\": \"\", \"phone\": \"\", \"email\": \"\", \"amount\": \"\", \"date\": \"\"}. \
Fill each value with what the receipt shows. Use an empty string for anything \
that is not visible or not readable.";

#[derive(Debug, Error)]
enum ExtractionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Media error: {0}")]
    Media(#[from] crate::media::MediaError),
}

/// Vision extraction boundary, injectable for dialogue tests.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    /// Best-effort extraction. Unreadable receipts and service failures both
    /// come back as an all-empty record, never as an error.
    async fn extract(&self, image: &TempImage) -> ReceiptRecord;
}

pub struct OpenAiVisionExtractor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiVisionExtractor {
    pub fn new(config: &GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.vision_model.clone(),
        }
    }

    async fn try_extract(&self, image: &TempImage) -> Result<ReceiptRecord, ExtractionError> {
        let bytes = image.read_bytes().await?;
        let data_url = encode_data_url(image.mime_type(), &bytes);

        let url = format!("{}/chat/completions", self.base_url);
        let request = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": EXTRACTION_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
            "max_tokens": 300,
            "temperature": 0
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api(error_text));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| ExtractionError::Parse("no choices in response".to_string()))?;

        debug!(model = %self.model, reply_len = content.len(), "Vision model replied");
        parse_record(content)
    }
}

#[async_trait]
impl ReceiptExtractor for OpenAiVisionExtractor {
    async fn extract(&self, image: &TempImage) -> ReceiptRecord {
        match self.try_extract(image).await {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "Receipt extraction failed, returning empty record");
                ReceiptRecord::default()
            }
        }
    }
}

fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Models wrap their JSON in markdown fences often enough that stripping
/// them is part of the contract.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn parse_record(content: &str) -> Result<ReceiptRecord, ExtractionError> {
    serde_json::from_str(strip_code_fences(content))
        .map_err(|err| ExtractionError::Parse(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
