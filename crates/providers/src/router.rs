//! Model router: task complexity classification and cost/quality-aware
//! model selection.
//!
//! The decision logic is pure, synchronous functions over the configured
//! routing tables — no HTTP, no async.  [`ModelRouter`] wraps them with
//! per-model usage counters and a running notional-savings total for the
//! status surface.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;

use tg_domain::config::{LlmConfig, Objective, ProviderKind, Tier};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Context sizes above this are classified complex.
const COMPLEX_CONTEXT_CHARS: usize = 50_000;

/// Context sizes above this are classified medium.
const MEDIUM_CONTEXT_CHARS: usize = 10_000;

/// Token estimate used for savings reporting is capped here.
const SAVINGS_TOKEN_CAP: usize = 4_000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The result of a routing decision.
#[derive(Debug, Clone)]
pub struct Selection {
    pub model: String,
    pub provider: ProviderKind,
    pub tier: Tier,
    /// Notional dollars saved versus the costliest available candidate.
    pub estimated_savings: f64,
    /// True when a forced model skipped classification entirely.
    pub bypassed: bool,
}

/// Router telemetry: selection counts and accumulated notional savings.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RouterUsage {
    pub selections: u64,
    pub total_saved: f64,
    pub model_usage: HashMap<String, u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classify a task's complexity.
///
/// Resolution order: role override, then keyword match against the prompt
/// (tiers scanned in declaration order), then context-size thresholds,
/// then simple.
pub fn classify_task(
    config: &LlmConfig,
    prompt: &str,
    role: Option<&str>,
    context_size: usize,
) -> Tier {
    let prompt_lower = prompt.to_lowercase();

    match role {
        Some("architect") | Some("researcher") => return Tier::Complex,
        Some("reviewer") | Some("optimizer") => {
            return if prompt_lower.contains("security") {
                Tier::Complex
            } else {
                Tier::Medium
            };
        }
        Some("coder") => return Tier::Medium,
        Some("tester") | Some("documenter") => {
            return if context_size > MEDIUM_CONTEXT_CHARS {
                Tier::Medium
            } else {
                Tier::Simple
            };
        }
        _ => {}
    }

    for (tier, routing) in config.tiers.iter() {
        if routing.keywords.iter().any(|k| prompt_lower.contains(k.as_str())) {
            return tier;
        }
    }

    if context_size > COMPLEX_CONTEXT_CHARS {
        Tier::Complex
    } else if context_size > MEDIUM_CONTEXT_CHARS {
        Tier::Medium
    } else {
        Tier::Simple
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pick a model for a task.
///
/// A forced model bypasses classification and availability filtering and is
/// returned verbatim.  Otherwise candidates for the classified tier are
/// intersected with `available`; an empty intersection falls back to the
/// first available model of any tier, or the configured fallback when
/// nothing is available at all.
pub fn select_model(
    config: &LlmConfig,
    available: &[String],
    prompt: &str,
    role: Option<&str>,
    context_size: usize,
    forced_model: Option<&str>,
    objective: Option<Objective>,
) -> Selection {
    if let Some(model) = forced_model {
        tracing::info!(model, "using forced model");
        return Selection {
            model: model.to_string(),
            provider: config.provider_for(model),
            tier: Tier::Complex, // sensible default for explicit overrides
            estimated_savings: 0.0,
            bypassed: true,
        };
    }

    let tier = classify_task(config, prompt, role, context_size);
    let candidates = &config.tiers.get(tier).models;

    let mut pool: Vec<&str> = candidates
        .iter()
        .map(String::as_str)
        .filter(|m| available.iter().any(|a| a == m))
        .collect();

    if pool.is_empty() {
        tracing::warn!(%tier, "no candidate models available, using fallback");
        match available.first() {
            Some(first) => pool.push(first.as_str()),
            None => {
                return Selection {
                    model: config.fallback_model.clone(),
                    provider: config.provider_for(&config.fallback_model),
                    tier,
                    estimated_savings: 0.0,
                    bypassed: false,
                };
            }
        }
    }

    let objective = objective.unwrap_or(config.optimize_for);
    let selected = match objective {
        Objective::Cost => pick_cheapest(config, &pool),
        Objective::Quality => pick_costliest(config, &pool),
        Objective::Balanced => pool[0],
    };

    let estimated_savings = savings_versus_costliest(config, &pool, selected, context_size);

    Selection {
        model: selected.to_string(),
        provider: config.provider_for(selected),
        tier,
        estimated_savings,
        bypassed: false,
    }
}

/// First candidate with strictly minimal cost — ties keep declaration order.
fn pick_cheapest<'a>(config: &LlmConfig, pool: &[&'a str]) -> &'a str {
    let mut best = pool[0];
    for candidate in &pool[1..] {
        if config.cost_per_1k(candidate) < config.cost_per_1k(best) {
            best = candidate;
        }
    }
    best
}

/// First candidate with strictly maximal cost — ties keep declaration order.
fn pick_costliest<'a>(config: &LlmConfig, pool: &[&'a str]) -> &'a str {
    let mut best = pool[0];
    for candidate in &pool[1..] {
        if config.cost_per_1k(candidate) > config.cost_per_1k(best) {
            best = candidate;
        }
    }
    best
}

/// Notional savings of the pick versus the costliest candidate, using a
/// capped token estimate.  Zero when the pool has a single entry or the
/// pick is already the costliest.
fn savings_versus_costliest(
    config: &LlmConfig,
    pool: &[&str],
    selected: &str,
    context_size: usize,
) -> f64 {
    if pool.len() < 2 {
        return 0.0;
    }
    let costliest = pick_costliest(config, pool);
    if costliest == selected {
        return 0.0;
    }
    let estimated_tokens = (context_size + 1_000).min(SAVINGS_TOKEN_CAP);
    let per_1k_delta = config.cost_per_1k(costliest) - config.cost_per_1k(selected);
    per_1k_delta * (estimated_tokens as f64 / 1_000.0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ModelRouter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stateful router: wraps [`select_model`] with usage telemetry.
pub struct ModelRouter {
    config: LlmConfig,
    usage: Mutex<RouterUsage>,
}

impl ModelRouter {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            usage: Mutex::new(RouterUsage::default()),
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Route one request and record the decision.
    pub fn select(
        &self,
        available: &[String],
        prompt: &str,
        role: Option<&str>,
        context_size: usize,
        forced_model: Option<&str>,
        objective: Option<Objective>,
    ) -> Selection {
        let selection = select_model(
            &self.config,
            available,
            prompt,
            role,
            context_size,
            forced_model,
            objective,
        );

        {
            let mut usage = self.usage.lock();
            usage.selections += 1;
            usage.total_saved += selection.estimated_savings;
            *usage
                .model_usage
                .entry(selection.model.clone())
                .or_insert(0) += 1;
        }

        tracing::info!(
            model = %selection.model,
            provider = %selection.provider,
            tier = %selection.tier,
            bypassed = selection.bypassed,
            "model selected"
        );
        selection
    }

    /// Telemetry snapshot for the status surface.
    pub fn usage(&self) -> RouterUsage {
        self.usage.lock().clone()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
