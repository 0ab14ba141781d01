use anyhow::Context;

use super::MessagingClient;
use crate::config::AppConfig;

/// LINE Messaging API client covering the two delivery endpoints the relay
/// uses: `reply` (token-scoped, normal webhook path) and `push`
/// (user-addressed, for flows without a live reply token).
pub struct LineClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl LineClient {
    pub fn new(cfg: &AppConfig) -> Self {
        let timeout = std::time::Duration::from_millis(cfg.http_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: cfg.line_api_base.trim_end_matches('/').to_string(),
            access_token: cfg.line_channel_access_token.clone(),
        }
    }

    async fn post_message(&self, path: &str, body: serde_json::Value) -> anyhow::Result<()> {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", path))?
            .error_for_status()
            .with_context(|| format!("{} returned error status", path))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessagingClient for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [ { "type": "text", "text": text } ],
        });
        self.post_message("/v2/bot/message/reply", body).await
    }

    async fn push(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "to": user_id,
            "messages": [ { "type": "text", "text": text } ],
        });
        self.post_message("/v2/bot/message/push", body).await
    }
}
