//! Groq chat-completion provider (OpenAI-compatible API)

use crate::error::{NarrationError, Result};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const DEFAULT_MODEL: &str = "llama3-8b-8192";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GroqProvider {
    api_key: String,
    client: Client,
    base_url: String,
    model: String,
}

impl GroqProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Read the credential from `GROQ_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| NarrationError::MissingApiKey("Groq".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(NarrationError::MissingApiKey("Groq".to_string()));
        }
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.2,
            "max_tokens": 256,
        });

        debug!(model = %self.model, "Sending narration request");

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == 429 {
            return Err(NarrationError::RateLimit);
        }
        if status == 401 || status == 403 {
            return Err(NarrationError::AuthenticationFailed);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error_msg = if text.len() > 500 {
                format!("HTTP {}: {}", status, &text[..500])
            } else {
                format!("HTTP {}: {}", status, text)
            };
            return Err(NarrationError::InvalidResponse(error_msg));
        }

        let json: serde_json::Value = response.json().await?;

        let choices = json.get("choices").and_then(|c| c.as_array()).ok_or_else(|| {
            NarrationError::InvalidResponse("Invalid response format: no choices array".to_string())
        })?;
        if choices.is_empty() {
            return Err(NarrationError::InvalidResponse(
                "No choices in response".to_string(),
            ));
        }

        let content = choices[0]["message"]["content"].as_str().ok_or_else(|| {
            NarrationError::InvalidResponse("No message content in response".to_string())
        })?;

        Ok(content.to_string())
    }
}
