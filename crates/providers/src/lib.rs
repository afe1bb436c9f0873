//! LLM provider adapters, the model router, and the retry wrapper.
//!
//! [`registry::ProviderRegistry`] instantiates one adapter per backend with
//! usable credentials; [`router`] picks a model per request balancing
//! capability need against cost; [`retry`] wraps each outbound call with
//! exponential backoff.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod retry;
pub mod router;
pub mod traits;

mod util;

pub use registry::ProviderRegistry;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use router::{ModelRouter, RouterUsage, Selection};
pub use traits::{ChatProvider, ChatReply};
