//! Health and status endpoints.
//!
//! - `GET /health` — liveness probe
//! - `GET /api/status` — limiter snapshot + router telemetry

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /health` — liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /api/status` — today's usage against the ceilings, cost-savings
/// telemetry, and which backends are reachable.
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.limiter.status() {
        Ok(limits) => {
            let providers: Vec<&str> = state
                .registry
                .available_kinds()
                .iter()
                .map(|k| k.as_str())
                .collect();
            Json(serde_json::json!({
                "limits": limits,
                "router": state.router.usage(),
                "providers": providers,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "status snapshot failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
