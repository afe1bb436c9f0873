use std::sync::Arc;

use tg_domain::config::Config;
use tg_limits::{CounterStore, RateLimiter};
use tg_providers::{ModelRouter, ProviderRegistry};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, admission control, routing
/// - **Security** — startup-computed admin token hash
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    /// Shared counter store (kept for background retention sweeps).
    pub store: Arc<CounterStore>,
    /// Admission control + daily spend ledger.
    pub limiter: Arc<RateLimiter>,
    /// Model selection + usage telemetry.
    pub router: Arc<ModelRouter>,
    /// Initialized chat backends.
    pub registry: Arc<ProviderRegistry>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the admin bearer token (read once at startup).
    /// `None` = admin endpoints disabled.
    pub admin_token_hash: Option<Vec<u8>>,
}
