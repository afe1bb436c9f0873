//! Provider registry.
//!
//! Constructs and holds one adapter per backend with usable credentials.
//! Credential env vars are probed once at startup; the local Ollama adapter
//! is always registered.  The registry is the router's availability filter:
//! a model is available iff its backend initialized.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tg_domain::config::{LlmConfig, ProviderKind};

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::retry::RetryPolicy;
use crate::traits::ChatProvider;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated chat backends.
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    /// Probe credentials and build the registry.
    ///
    /// Backends that fail to initialize are logged and skipped rather than
    /// aborting startup; a registry with only the local backend still serves.
    pub fn from_config(config: &LlmConfig) -> Self {
        let retry = RetryPolicy::from_config(config);
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();

        match probe_env(&config.anthropic_key_env) {
            Some(key) => match AnthropicProvider::new(
                &config.anthropic_base_url,
                key,
                retry.clone(),
                timeout,
            ) {
                Ok(p) => {
                    tracing::info!("registered anthropic provider");
                    providers.insert(ProviderKind::Anthropic, Arc::new(p));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to initialize anthropic provider, skipping");
                }
            },
            None => {
                tracing::info!(
                    env = %config.anthropic_key_env,
                    "anthropic credentials absent, provider unavailable"
                );
            }
        }

        match probe_env(&config.openai_key_env) {
            Some(key) => {
                match OpenAiProvider::new(&config.openai_base_url, key, retry.clone(), timeout) {
                    Ok(p) => {
                        tracing::info!("registered openai provider");
                        providers.insert(ProviderKind::Openai, Arc::new(p));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to initialize openai provider, skipping");
                    }
                }
            }
            None => {
                tracing::info!(
                    env = %config.openai_key_env,
                    "openai credentials absent, provider unavailable"
                );
            }
        }

        // Local models need no credentials.
        match OllamaProvider::new(&config.ollama_base_url, retry, timeout) {
            Ok(p) => {
                providers.insert(ProviderKind::Ollama, Arc::new(p));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to initialize ollama provider, skipping");
            }
        }

        tracing::info!(providers = providers.len(), "provider registry ready");
        Self { providers }
    }

    /// Registry with an explicit provider map (tests).
    pub fn with_providers(providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>) -> Self {
        Self { providers }
    }

    /// Look up an initialized backend.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Models from the capability table whose backend is available.
    ///
    /// Ordered by backend priority (anthropic, openai, ollama) and, within a
    /// backend, by per-unit cost descending — so the "first available model"
    /// fallback picks the most capable reachable model.
    pub fn available_models(&self, config: &LlmConfig) -> Vec<String> {
        let mut models: Vec<(&String, &tg_domain::config::ModelInfo)> = config
            .models
            .iter()
            .filter(|(_, info)| self.is_available(info.provider))
            .collect();

        let backend_rank = |kind: ProviderKind| match kind {
            ProviderKind::Anthropic => 0,
            ProviderKind::Openai => 1,
            ProviderKind::Ollama => 2,
        };
        models.sort_by(|(a_name, a), (b_name, b)| {
            backend_rank(a.provider)
                .cmp(&backend_rank(b.provider))
                .then(
                    b.cost_per_1k
                        .partial_cmp(&a.cost_per_1k)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a_name.cmp(b_name))
        });

        models.into_iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Available backend labels, for the status surface.
    pub fn available_kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

fn probe_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use tg_domain::error::Result;

    struct FakeProvider(&'static str);

    #[async_trait::async_trait]
    impl ChatProvider for FakeProvider {
        async fn chat(
            &self,
            _model: &str,
            _prompt: &str,
            _system: Option<&str>,
        ) -> Result<crate::traits::ChatReply> {
            Ok(crate::traits::ChatReply {
                text: "ok".into(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
        fn provider_id(&self) -> &str {
            self.0
        }
    }

    fn registry_with(kinds: &[ProviderKind]) -> ProviderRegistry {
        let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();
        for kind in kinds {
            providers.insert(*kind, Arc::new(FakeProvider(kind.as_str())));
        }
        ProviderRegistry::with_providers(providers)
    }

    #[test]
    fn available_models_filters_by_backend() {
        let config = LlmConfig::default();
        let registry = registry_with(&[ProviderKind::Ollama]);
        let models = registry.available_models(&config);
        assert_eq!(models, vec!["ollama:codellama".to_string()]);
    }

    #[test]
    fn available_models_orders_anthropic_first() {
        let config = LlmConfig::default();
        let registry = registry_with(&[
            ProviderKind::Anthropic,
            ProviderKind::Openai,
            ProviderKind::Ollama,
        ]);
        let models = registry.available_models(&config);
        assert_eq!(models.first().map(String::as_str), Some("claude-3-5-sonnet-20241022"));
        assert_eq!(models.last().map(String::as_str), Some("ollama:codellama"));
        assert_eq!(models.len(), 5);
    }

    #[test]
    fn empty_registry_has_no_models() {
        let config = LlmConfig::default();
        let registry = registry_with(&[]);
        assert!(registry.available_models(&config).is_empty());
        assert!(registry.is_empty());
    }
}
