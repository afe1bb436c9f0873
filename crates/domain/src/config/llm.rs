use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Providers & tiers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of chat backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    Openai,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Openai => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task complexity classification driving model candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Simple,
    Medium,
    Complex,
    LocalFirst,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Simple => "simple",
            Tier::Medium => "medium",
            Tier::Complex => "complex",
            Tier::LocalFirst => "local_first",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selection objective when several candidate models are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Cheapest per-unit model wins.
    #[default]
    Cost,
    /// Costliest per-unit model wins (proxy for capability).
    Quality,
    /// First candidate in declared order wins.
    Balanced,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routing & capability tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Candidate models and trigger keywords for one complexity tier.
///
/// The order of `models` is meaningful: it is the declared preference
/// order, used to break ties and as the `balanced` objective's pick.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutingTier {
    pub models: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Per-tier routing table.  Field order is the keyword-scan order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTable {
    #[serde(default = "d_simple_tier")]
    pub simple: RoutingTier,
    #[serde(default = "d_medium_tier")]
    pub medium: RoutingTier,
    #[serde(default = "d_complex_tier")]
    pub complex: RoutingTier,
    #[serde(default = "d_local_first_tier")]
    pub local_first: RoutingTier,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            simple: d_simple_tier(),
            medium: d_medium_tier(),
            complex: d_complex_tier(),
            local_first: d_local_first_tier(),
        }
    }
}

impl TierTable {
    pub fn get(&self, tier: Tier) -> &RoutingTier {
        match tier {
            Tier::Simple => &self.simple,
            Tier::Medium => &self.medium,
            Tier::Complex => &self.complex,
            Tier::LocalFirst => &self.local_first,
        }
    }

    /// Iterate tiers in declaration order (the keyword-scan order).
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &RoutingTier)> {
        [
            (Tier::Simple, &self.simple),
            (Tier::Medium, &self.medium),
            (Tier::Complex, &self.complex),
            (Tier::LocalFirst, &self.local_first),
        ]
        .into_iter()
    }
}

/// Cost and backend for a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Dollars per 1k tokens (input + output combined).
    pub cost_per_1k: f64,
    pub provider: ProviderKind,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LlmConfig
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub optimize_for: Objective,
    /// Retry attempts per outbound provider call.
    #[serde(default = "d_3")]
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    #[serde(default = "d_1000u")]
    pub retry_base_delay_ms: u64,
    /// Timeout per outbound HTTP request.
    #[serde(default = "d_120000u")]
    pub request_timeout_ms: u64,
    /// Complexity tier → candidate models + trigger keywords.
    #[serde(default)]
    pub tiers: TierTable,
    /// Model → cost/provider capability table.
    #[serde(default = "d_models")]
    pub models: HashMap<String, ModelInfo>,
    /// Used when no candidate model is available at all.
    #[serde(default = "d_fallback_model")]
    pub fallback_model: String,
    /// Provider label reported for forced models missing a capability entry.
    #[serde(default = "d_fallback_provider")]
    pub fallback_provider: ProviderKind,
    /// Env var probed for Anthropic credentials.
    #[serde(default = "d_anthropic_env")]
    pub anthropic_key_env: String,
    /// Env var probed for OpenAI credentials.
    #[serde(default = "d_openai_env")]
    pub openai_key_env: String,
    #[serde(default = "d_anthropic_url")]
    pub anthropic_base_url: String,
    #[serde(default = "d_openai_url")]
    pub openai_base_url: String,
    /// Local Ollama endpoint; always considered available.
    #[serde(default = "d_ollama_url")]
    pub ollama_base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            optimize_for: Objective::Cost,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            request_timeout_ms: 120_000,
            tiers: TierTable::default(),
            models: d_models(),
            fallback_model: d_fallback_model(),
            fallback_provider: d_fallback_provider(),
            anthropic_key_env: d_anthropic_env(),
            openai_key_env: d_openai_env(),
            anthropic_base_url: d_anthropic_url(),
            openai_base_url: d_openai_url(),
            ollama_base_url: d_ollama_url(),
        }
    }
}

impl LlmConfig {
    /// Cost per 1k tokens for a model, or a conservative default for
    /// models missing from the capability table.
    pub fn cost_per_1k(&self, model: &str) -> f64 {
        self.models.get(model).map(|m| m.cost_per_1k).unwrap_or(0.1)
    }

    /// Backend for a model; unknown models get the fallback provider label.
    pub fn provider_for(&self, model: &str) -> ProviderKind {
        self.models
            .get(model)
            .map(|m| m.provider)
            .unwrap_or(self.fallback_provider)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3() -> u32 {
    3
}
fn d_1000u() -> u64 {
    1_000
}
fn d_120000u() -> u64 {
    120_000
}
fn d_fallback_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn d_fallback_provider() -> ProviderKind {
    ProviderKind::Anthropic
}
fn d_anthropic_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn d_openai_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_anthropic_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_openai_url() -> String {
    "https://api.openai.com".into()
}
fn d_ollama_url() -> String {
    "http://localhost:11434".into()
}

fn d_simple_tier() -> RoutingTier {
    RoutingTier {
        models: vec!["ollama:codellama".into(), "gpt-3.5-turbo".into()],
        keywords: strings(&["fix", "typo", "format", "rename", "simple", "comment"]),
    }
}
fn d_medium_tier() -> RoutingTier {
    RoutingTier {
        models: vec!["gpt-3.5-turbo".into(), "claude-instant".into()],
        keywords: strings(&["implement", "function", "add", "feature", "debug", "test"]),
    }
}
fn d_complex_tier() -> RoutingTier {
    RoutingTier {
        models: vec!["claude-3-5-sonnet-20241022".into(), "gpt-4".into()],
        keywords: strings(&["design", "architect", "security", "review", "optimize", "research"]),
    }
}
fn d_local_first_tier() -> RoutingTier {
    RoutingTier {
        models: vec!["ollama:codellama".into()],
        keywords: strings(&["boilerplate", "template"]),
    }
}

fn d_models() -> HashMap<String, ModelInfo> {
    let mut models = HashMap::new();
    models.insert(
        "claude-3-5-sonnet-20241022".to_string(),
        ModelInfo {
            cost_per_1k: 0.03,
            provider: ProviderKind::Anthropic,
        },
    );
    models.insert(
        "claude-instant".to_string(),
        ModelInfo {
            cost_per_1k: 0.008,
            provider: ProviderKind::Anthropic,
        },
    );
    models.insert(
        "gpt-4".to_string(),
        ModelInfo {
            cost_per_1k: 0.03,
            provider: ProviderKind::Openai,
        },
    );
    models.insert(
        "gpt-3.5-turbo".to_string(),
        ModelInfo {
            cost_per_1k: 0.001,
            provider: ProviderKind::Openai,
        },
    );
    models.insert(
        "ollama:codellama".to_string(),
        ModelInfo {
            cost_per_1k: 0.0,
            provider: ProviderKind::Ollama,
        },
    );
    models
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tiers_cover_all_four() {
        let tiers = TierTable::default();
        let names: Vec<Tier> = tiers.iter().map(|(t, _)| t).collect();
        assert_eq!(
            names,
            vec![Tier::Simple, Tier::Medium, Tier::Complex, Tier::LocalFirst]
        );
        for (_, routing) in tiers.iter() {
            assert!(!routing.models.is_empty());
        }
    }

    #[test]
    fn default_models_match_tier_candidates() {
        let config = LlmConfig::default();
        for (_, routing) in config.tiers.iter() {
            for model in &routing.models {
                assert!(
                    config.models.contains_key(model),
                    "tier model {model} missing from capability table"
                );
            }
        }
    }

    #[test]
    fn unknown_model_gets_conservative_cost() {
        let config = LlmConfig::default();
        assert!((config.cost_per_1k("mystery-model") - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unknown_model_gets_fallback_provider() {
        let config = LlmConfig::default();
        assert_eq!(config.provider_for("mystery-model"), ProviderKind::Anthropic);
    }

    #[test]
    fn ollama_models_are_free() {
        let config = LlmConfig::default();
        assert_eq!(config.cost_per_1k("ollama:codellama"), 0.0);
        assert_eq!(config.provider_for("ollama:codellama"), ProviderKind::Ollama);
    }

    #[test]
    fn objective_deserializes_lowercase() {
        let config: LlmConfig = toml::from_str("optimize_for = \"quality\"").unwrap();
        assert_eq!(config.optimize_for, Objective::Quality);
    }
}
