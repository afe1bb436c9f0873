use tg_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reply type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion.
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// Textual content of the response.
    pub text: String,
    /// Prompt tokens reported by the backend; `0` when not reported.
    pub input_tokens: u32,
    /// Completion tokens reported by the backend; `0` when not reported.
    pub output_tokens: u32,
}

impl ChatReply {
    /// Total tokens for cost accounting.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every chat backend adapter must implement.
///
/// Implementations translate between our internal types and the wire
/// format of each provider's HTTP API.  Transient call failures are
/// retried inside the adapter; the error returned here is final.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a prompt and wait for the full response.
    async fn chat(&self, model: &str, prompt: &str, system: Option<&str>) -> Result<ChatReply>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
