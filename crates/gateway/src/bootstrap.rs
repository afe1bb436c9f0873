//! AppState construction and background-task spawning.
//!
//! Shared by `serve` and any future one-shot commands that need the full
//! runtime without an HTTP listener.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use tg_domain::config::{Config, ConfigSeverity};
use tg_limits::{CounterStore, RateLimiter, REQUEST_RETENTION_DAYS, STATS_RETENTION_DAYS};
use tg_providers::{ModelRouter, ProviderRegistry};

use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Counter store + admission control ────────────────────────────
    let limits = config.limits.clone().with_env_overrides();
    let store = Arc::new(
        CounterStore::open(&limits.db_path).context("opening counter store")?,
    );

    // Startup retention sweep.  Maintenance failures never abort boot.
    match store.purge_older_than(REQUEST_RETENTION_DAYS, STATS_RETENTION_DAYS) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "purged old request rows at startup"),
        Err(e) => tracing::warn!(error = %e, "startup retention sweep failed"),
    }

    let limiter = Arc::new(RateLimiter::new(store.clone(), limits));
    tracing::info!("rate limiter ready");

    // ── Providers + router ───────────────────────────────────────────
    let registry = Arc::new(ProviderRegistry::from_config(&config.llm));
    if registry.is_empty() {
        tracing::warn!("no chat backends initialized — /api/chat will fail until one is reachable");
    }
    let router = Arc::new(ModelRouter::new(config.llm.clone()));
    tracing::info!("model router ready");

    // ── Admin token (read once, hash for constant-time comparison) ──
    let admin_token_hash = {
        let env_var = &config.admin.token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(source = %format!("env:{env_var}"), "admin endpoints enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(
                    "admin endpoints DISABLED — set the {env_var} env var to enable them"
                );
                None
            }
        }
    };

    Ok(AppState {
        config,
        store,
        limiter,
        router,
        registry,
        admin_token_hash,
    })
}

/// Spawn the long-running background tasks.  Call this **after**
/// [`build_app_state`] when running the HTTP server.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic retention sweep (every 6h; startup sweep already ran) ──
    {
        let store = state.store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(
                std::time::Duration::from_secs(6 * 3_600),
            );
            interval.tick().await; // consume the immediate first tick
            loop {
                interval.tick().await;
                match store.purge_older_than(REQUEST_RETENTION_DAYS, STATS_RETENTION_DAYS) {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "retention sweep purged request rows"),
                    Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
                }
            }
        });
    }
    tracing::info!("background tasks spawned");
}
