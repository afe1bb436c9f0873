//! Anthropic Messages API adapter.

use serde_json::Value;

use tg_domain::error::{Error, Result};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::{ChatProvider, ChatReply};
use crate::util::{from_reqwest, status_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4_000;

/// Adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        retry: RetryPolicy,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry,
            client,
        })
    }

    async fn send_chat(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<ChatReply> {
        let url = format!("{}/v1/messages", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(system) = system {
            body["system"] = Value::String(system.to_string());
        }

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status, body_text));
        }

        let json: Value = resp.json().await.map_err(from_reqwest)?;

        let text = json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| blocks.first())
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Provider {
                provider: "anthropic".into(),
                message: "response missing content text".into(),
            })?
            .to_string();

        let usage = json.get("usage");
        let token = |field: &str| -> u32 {
            usage
                .and_then(|u| u.get(field))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32
        };

        Ok(ChatReply {
            text,
            input_tokens: token("input_tokens"),
            output_tokens: token("output_tokens"),
        })
    }
}

#[async_trait::async_trait]
impl ChatProvider for AnthropicProvider {
    async fn chat(&self, model: &str, prompt: &str, system: Option<&str>) -> Result<ChatReply> {
        retry_with_backoff(&self.retry, "anthropic chat", || {
            self.send_chat(model, prompt, system)
        })
        .await
    }

    fn provider_id(&self) -> &str {
        "anthropic"
    }
}
