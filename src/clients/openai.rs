use anyhow::Context;

use super::CompletionClient;
use crate::config::AppConfig;

const SYSTEM_PROMPT: &str = "You are a helpful assistant for a LINE chat.";

/// Chat-completions client. Holds a preconfigured `reqwest::Client` with
/// the transport timeout applied at construction; there is no relay-level
/// timeout layer on top of it.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(cfg: &AppConfig) -> Self {
        let timeout = std::time::Duration::from_millis(cfg.http_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: cfg.openai_api_base.trim_end_matches('/').to_string(),
            api_key: cfg.openai_api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    /// `choices[0].message.content`, or empty string when absent. The
    /// caller substitutes its own fallback for empty answers.
    fn extract_answer(body: &serde_json::Value) -> String {
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .to_string()
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()
            .context("completion service returned error status")?;
        let json: serde_json::Value = resp
            .json()
            .await
            .context("completion response was not valid JSON")?;
        Ok(Self::extract_answer(&json))
    }
}
