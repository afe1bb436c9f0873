//! Chat endpoint — the admission → route → call → account control flow.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use tg_domain::config::{LlmConfig, Objective};
use tg_providers::ChatProvider as _;

use crate::identity::client_identity;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    /// Agent role label supplied by the caller (e.g. "architect").
    #[serde(default)]
    pub role: Option<String>,
    /// Accumulated context prepended to the prompt; its size feeds
    /// complexity classification.
    #[serde(default)]
    pub context: Option<String>,
    /// Forced model override — bypasses routing entirely.
    #[serde(default)]
    pub model: Option<String>,
    /// Per-request objective override.
    #[serde(default)]
    pub objective: Option<Objective>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub model: String,
    pub provider: String,
    pub tier: String,
    pub cost: f64,
    pub rate_limit: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `POST /api/chat` — admit, route, call the provider, record cost.
pub async fn chat(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let identity = client_identity(&headers, peer);

    let verdict = state.limiter.check(&identity);
    if !verdict.admitted {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": verdict.message })),
        )
            .into_response();
    }

    let context_size = req.context.as_deref().map(str::len).unwrap_or(0);
    let available = state.registry.available_models(state.router.config());
    let selection = state.router.select(
        &available,
        &req.prompt,
        req.role.as_deref(),
        context_size,
        req.model.as_deref(),
        req.objective,
    );

    // Forced models can name a backend that never initialized.
    let Some(provider) = state.registry.get(selection.provider) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": format!("provider {} has no usable credentials", selection.provider),
            })),
        )
            .into_response();
    };

    let prompt = match req.context.as_deref() {
        Some(context) if !context.is_empty() => format!("{context}\n\n{}", req.prompt),
        _ => req.prompt.clone(),
    };

    match provider.chat(&selection.model, &prompt, None).await {
        Ok(reply) => {
            let cost = call_cost(
                state.router.config(),
                &selection.model,
                reply.total_tokens(),
                context_size,
            );
            state.limiter.add_cost(cost);

            Json(ChatResponse {
                response: reply.text,
                model: selection.model,
                provider: selection.provider.to_string(),
                tier: selection.tier.to_string(),
                cost,
                rate_limit: verdict.message,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, model = %selection.model, "provider call failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Dollar cost of one call: reported token usage when the backend supplies
/// it, else the same capped estimate the router uses for savings.
fn call_cost(config: &LlmConfig, model: &str, total_tokens: u32, context_size: usize) -> f64 {
    let tokens = if total_tokens > 0 {
        total_tokens as usize
    } else {
        (context_size + 1_000).min(4_000)
    };
    config.cost_per_1k(model) * (tokens as f64 / 1_000.0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
