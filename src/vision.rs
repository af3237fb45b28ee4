use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{config::Config, error::AppError};

/// System instruction used when the request carries no `prompt` field.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that identifies objects and provides brief descriptions of each object in the image.";

/// Per-image user instruction sent alongside the encoded image.
pub const USER_INSTRUCTION: &str = "Analyze this image and describe each object you see briefly:";

/// How long one outbound call may take before it is failed. No retry follows.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const MAX_TOKENS: u32 = 500;

/// The seam between the upload pipeline and the external vision service.
///
/// Production code talks to the real API through [`OpenAiVision`]; tests
/// substitute a fake. One call describes one image, synchronously from the
/// caller's point of view, and any failure collapses into
/// [`AppError::Analysis`].
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Returns a textual description of the image encoded in `data_uri`,
    /// steered by `system_prompt`.
    async fn describe(&self, data_uri: &str, system_prompt: &str) -> Result<String, AppError>;
}

/// [`VisionModel`] backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl OpenAiVision {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl VisionModel for OpenAiVision {
    async fn describe(&self, data_uri: &str, system_prompt: &str) -> Result<String, AppError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_INSTRUCTION },
                        { "type": "image_url", "image_url": { "url": data_uri } }
                    ]
                }
            ],
            "max_tokens": MAX_TOKENS,
        });

        log::debug!("Sending analysis request to {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AppError::analysis(format!(
                "vision API returned {status}: {body}"
            )));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| AppError::analysis(format!("malformed vision API response: {e}")))?;
        extract_description(&value)
    }
}

/// Pulls the assistant message text out of a chat-completions response body.
fn extract_description(value: &Value) -> Result<String, AppError> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(|text| text.trim().to_string())
        .ok_or_else(|| AppError::analysis("vision API response contained no description"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trimmed_message_content() {
        let body = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  A red hammer.\n" } }
            ]
        });

        assert_eq!(extract_description(&body).unwrap(), "A red hammer.");
    }

    #[test]
    fn missing_content_is_an_analysis_error() {
        let body = json!({ "choices": [] });

        let err = extract_description(&body).unwrap_err();
        assert!(matches!(err, AppError::Analysis(_)));
    }
}
