use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admission & spend ceilings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The four admission ceilings plus the counter-store location.
///
/// All ceilings are independently configurable; a ceiling of 0 means
/// "always reject".  Environment variables override the file values
/// (see [`LimitsConfig::with_env_overrides`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Admitted requests allowed per identity in any rolling hour.
    #[serde(default = "d_10")]
    pub max_requests_per_identity_hour: u32,
    /// Admitted requests allowed per identity in any rolling 24 hours.
    #[serde(default = "d_50")]
    pub max_requests_per_identity_day: u32,
    /// Total spend allowed per calendar day, in dollars.
    #[serde(default = "d_cost")]
    pub max_daily_cost: f64,
    /// Total admitted requests allowed per calendar day, across all identities.
    #[serde(default = "d_200")]
    pub max_daily_requests: u64,
    /// SQLite file backing the counter store.
    #[serde(default = "d_db_path")]
    pub db_path: PathBuf,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests_per_identity_hour: 10,
            max_requests_per_identity_day: 50,
            max_daily_cost: 1.00,
            max_daily_requests: 200,
            db_path: d_db_path(),
        }
    }
}

impl LimitsConfig {
    /// Apply the environment overrides the deployment surface documents:
    /// `MAX_REQUESTS_PER_IP_HOUR`, `MAX_REQUESTS_PER_IP_DAY`,
    /// `MAX_DAILY_COST`, `MAX_DAILY_REQUESTS`, `RATE_LIMIT_DB`.
    ///
    /// Unparsable values are logged and ignored, keeping the file/default
    /// value in place.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("MAX_REQUESTS_PER_IP_HOUR") {
            self.max_requests_per_identity_hour = v;
        }
        if let Some(v) = env_parse::<u32>("MAX_REQUESTS_PER_IP_DAY") {
            self.max_requests_per_identity_day = v;
        }
        if let Some(v) = env_parse::<f64>("MAX_DAILY_COST") {
            self.max_daily_cost = v;
        }
        if let Some(v) = env_parse::<u64>("MAX_DAILY_REQUESTS") {
            self.max_daily_requests = v;
        }
        if let Ok(path) = std::env::var("RATE_LIMIT_DB") {
            if !path.is_empty() {
                self.db_path = PathBuf::from(path);
            }
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10() -> u32 {
    10
}
fn d_50() -> u32 {
    50
}
fn d_cost() -> f64 {
    1.00
}
fn d_200() -> u64 {
    200
}
fn d_db_path() -> PathBuf {
    PathBuf::from("./data/rate_limits.db")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
