//! Integration tests for the model router — full selection flow against a
//! custom routing table, without any external services.

use std::collections::HashMap;

use tg_domain::config::{LlmConfig, ModelInfo, Objective, ProviderKind, RoutingTier, Tier};
use tg_providers::router::select_model;
use tg_providers::ModelRouter;

/// Two equal-cost complex candidates, one cheap medium candidate.
fn custom_config() -> LlmConfig {
    let mut config = LlmConfig::default();

    config.tiers.complex = RoutingTier {
        models: vec!["model-a".into(), "model-b".into()],
        keywords: vec!["design".into()],
    };
    config.tiers.medium = RoutingTier {
        models: vec!["model-cheap".into()],
        keywords: vec!["implement".into()],
    };

    let mut models = HashMap::new();
    models.insert(
        "model-a".to_string(),
        ModelInfo {
            cost_per_1k: 0.03,
            provider: ProviderKind::Anthropic,
        },
    );
    models.insert(
        "model-b".to_string(),
        ModelInfo {
            cost_per_1k: 0.03,
            provider: ProviderKind::Openai,
        },
    );
    models.insert(
        "model-cheap".to_string(),
        ModelInfo {
            cost_per_1k: 0.002,
            provider: ProviderKind::Openai,
        },
    );
    config.models = models;
    config
}

fn all_available() -> Vec<String> {
    vec![
        "model-a".to_string(),
        "model-b".to_string(),
        "model-cheap".to_string(),
    ]
}

#[test]
fn equal_cost_candidates_keep_declared_order() {
    let config = custom_config();
    let selection = select_model(
        &config,
        &all_available(),
        "design the pipeline",
        None,
        0,
        None,
        Some(Objective::Cost),
    );
    // Tie on cost must not re-sort: model-a is declared first.
    assert_eq!(selection.model, "model-a");
    assert_eq!(selection.tier, Tier::Complex);
    assert_eq!(selection.estimated_savings, 0.0);
}

#[test]
fn quality_tie_also_keeps_declared_order() {
    let config = custom_config();
    let selection = select_model(
        &config,
        &all_available(),
        "design the pipeline",
        None,
        0,
        None,
        Some(Objective::Quality),
    );
    assert_eq!(selection.model, "model-a");
}

#[test]
fn partial_availability_narrows_the_pool() {
    let config = custom_config();
    let available = vec!["model-b".to_string(), "model-cheap".to_string()];
    let selection = select_model(
        &config,
        &available,
        "design the pipeline",
        None,
        0,
        None,
        Some(Objective::Cost),
    );
    assert_eq!(selection.model, "model-b");
}

#[test]
fn objective_override_beats_config_default() {
    let mut config = custom_config();
    config.optimize_for = Objective::Cost;
    config.tiers.medium.models = vec!["model-cheap".into(), "model-b".into()];

    let selection = select_model(
        &config,
        &all_available(),
        "implement the widget",
        None,
        0,
        None,
        Some(Objective::Quality),
    );
    assert_eq!(selection.model, "model-b");
    assert_eq!(selection.tier, Tier::Medium);
}

#[test]
fn router_telemetry_round_trip() {
    let router = ModelRouter::new(custom_config());
    let available = all_available();

    let first = router.select(&available, "design the pipeline", None, 0, None, None);
    let second = router.select(&available, "implement the widget", None, 0, None, None);

    assert_eq!(first.model, "model-a");
    assert_eq!(second.model, "model-cheap");

    let usage = router.usage();
    assert_eq!(usage.selections, 2);
    assert_eq!(usage.model_usage.get("model-a"), Some(&1));
    assert_eq!(usage.model_usage.get("model-cheap"), Some(&1));
}

#[test]
fn forced_model_skips_availability_entirely() {
    let router = ModelRouter::new(custom_config());
    let selection = router.select(&[], "anything", None, 0, Some("model-b"), None);
    assert_eq!(selection.model, "model-b");
    assert_eq!(selection.provider, ProviderKind::Openai);
    assert!(selection.bypassed);
}
