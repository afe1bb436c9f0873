//! OpenAI Chat Completions adapter.

use serde_json::Value;

use tg_domain::error::{Error, Result};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::{ChatProvider, ChatReply};
use crate::util::{from_reqwest, status_error};

const MAX_TOKENS: u32 = 4_000;

/// Adapter for the OpenAI Chat Completions API.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAiProvider {
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
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut messages: Vec<Value> = Vec::new();
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_error("openai", status, body_text));
        }

        let json: Value = resp.json().await.map_err(from_reqwest)?;

        let text = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Provider {
                provider: "openai".into(),
                message: "response missing message content".into(),
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
            input_tokens: token("prompt_tokens"),
            output_tokens: token("completion_tokens"),
        })
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat(&self, model: &str, prompt: &str, system: Option<&str>) -> Result<ChatReply> {
        retry_with_backoff(&self.retry, "openai chat", || {
            self.send_chat(model, prompt, system)
        })
        .await
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}
