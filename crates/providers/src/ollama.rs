//! Local Ollama adapter.
//!
//! Needs no credentials and is always registered.  Model ids carry an
//! `ollama:` prefix in the routing tables (e.g. `ollama:codellama`), which
//! is stripped before hitting the API.

use serde_json::Value;

use tg_domain::error::{Error, Result};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::traits::{ChatProvider, ChatReply};
use crate::util::{from_reqwest, status_error};

/// Adapter for a local Ollama instance.
pub struct OllamaProvider {
    base_url: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str, retry: RetryPolicy, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
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
        let url = format!("{}/api/generate", self.base_url);
        let model = model.strip_prefix("ollama:").unwrap_or(model);

        let full_prompt = match system {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        };

        let body = serde_json::json!({
            "model": model,
            "prompt": full_prompt,
            "stream": false,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_error("ollama", status, body_text));
        }

        let json: Value = resp.json().await.map_err(from_reqwest)?;

        let text = json
            .get("response")
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Provider {
                provider: "ollama".into(),
                message: "response missing 'response' field".into(),
            })?
            .to_string();

        let token = |field: &str| -> u32 {
            json.get(field).and_then(|v| v.as_u64()).unwrap_or(0) as u32
        };

        Ok(ChatReply {
            text,
            input_tokens: token("prompt_eval_count"),
            output_tokens: token("eval_count"),
        })
    }
}

#[async_trait::async_trait]
impl ChatProvider for OllamaProvider {
    async fn chat(&self, model: &str, prompt: &str, system: Option<&str>) -> Result<ChatReply> {
        retry_with_backoff(&self.retry, "ollama chat", || {
            self.send_chat(model, prompt, system)
        })
        .await
    }

    fn provider_id(&self) -> &str {
        "ollama"
    }
}
