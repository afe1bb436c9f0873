pub mod admin;
pub mod chat;
pub mod status;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// `/health` and `/api/status` are public read-only surfaces; the admin
/// reset is gated behind the admin bearer token.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(status::health))
        .route("/api/status", get(status::get_status))
        .route("/api/chat", post(chat::chat))
        .route("/api/admin/reset-limits", post(admin::reset_limits))
}
