//! Layered admission control and daily spend ledger.
//!
//! [`RateLimiter`] combines four ceilings over the [`CounterStore`]: global
//! daily spend, global daily request count, per-identity hourly count, and
//! per-identity daily count.  When the store itself errors the limiter
//! **fails open** — the request is admitted and the error logged.  That is a
//! deliberate availability-over-strictness tradeoff, not an oversight; see
//! the fail-open test below before changing it.

use std::sync::Arc;

use chrono::{Local, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use tg_domain::config::LimitsConfig;
use tg_domain::error::Result;

use crate::store::{CounterStore, REQUEST_RETENTION_DAYS};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of an admission check.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub admitted: bool,
    pub message: String,
}

/// Read-only snapshot of today's usage against the configured ceilings.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStatus {
    pub daily_requests: u64,
    pub daily_cost: f64,
    pub unique_identities_today: u64,
    pub requests_remaining: u64,
    pub cost_remaining: f64,
    pub limits: ConfiguredLimits,
}

/// The four ceilings, as reported on the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredLimits {
    pub per_identity_hour: u32,
    pub per_identity_day: u32,
    pub daily_requests: u64,
    pub daily_cost: f64,
}

impl From<&LimitsConfig> for ConfiguredLimits {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            per_identity_hour: limits.max_requests_per_identity_hour,
            per_identity_day: limits.max_requests_per_identity_day,
            daily_requests: limits.max_daily_requests,
            daily_cost: limits.max_daily_cost,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RateLimiter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Admission control plus cost accounting over the shared counter store.
pub struct RateLimiter {
    store: Arc<CounterStore>,
    limits: LimitsConfig,
    /// Serializes the count-then-record sequence in [`RateLimiter::check`].
    /// Individual store statements are atomic, but the window counts and the
    /// admission record must not interleave between concurrent checks.
    gate: Mutex<()>,
}

impl RateLimiter {
    pub fn new(store: Arc<CounterStore>, limits: LimitsConfig) -> Self {
        Self {
            store,
            limits,
            gate: Mutex::new(()),
        }
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Check whether a request from `identity` is allowed, and if so record
    /// it.  Cheapest global checks run first; the order only determines
    /// which rejection message wins.
    ///
    /// Storage errors fail open: the request is admitted and the error is
    /// logged at error level.
    pub fn check(&self, identity: &str) -> Verdict {
        let _gate = self.gate.lock();
        match self.evaluate(identity) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!(error = %e, identity, "admission check failed, failing open");
                Verdict {
                    admitted: true,
                    message: "OK (rate limiter unavailable, allowing request)".into(),
                }
            }
        }
    }

    fn evaluate(&self, identity: &str) -> Result<Verdict> {
        let now = Utc::now();
        let today = Local::now().date_naive();

        let stats = self.store.get_or_create_daily(today)?;

        if stats.total_cost >= self.limits.max_daily_cost {
            tracing::warn!(total_cost = stats.total_cost, "daily cost ceiling hit");
            return Ok(reject(format!(
                "Daily cost limit reached (${:.2}). Try again tomorrow!",
                self.limits.max_daily_cost
            )));
        }

        if stats.total_requests >= self.limits.max_daily_requests {
            tracing::warn!(
                total_requests = stats.total_requests,
                "daily request ceiling hit"
            );
            return Ok(reject(format!(
                "Daily request limit reached ({}). Try again tomorrow!",
                self.limits.max_daily_requests
            )));
        }

        let hourly = self
            .store
            .count_requests_since(identity, now - chrono::Duration::hours(1))?;
        let daily = self
            .store
            .count_requests_since(identity, now - chrono::Duration::hours(24))?;

        if hourly >= u64::from(self.limits.max_requests_per_identity_hour) {
            return Ok(reject(format!(
                "Too many requests ({}/hour limit). Try again later!",
                self.limits.max_requests_per_identity_hour
            )));
        }

        if daily >= u64::from(self.limits.max_requests_per_identity_day) {
            return Ok(reject(format!(
                "Daily limit reached ({}/day). Try again tomorrow!",
                self.limits.max_requests_per_identity_day
            )));
        }

        // Admitted — record before reporting remaining quota.
        self.store.record_request(identity, now)?;
        self.store.increment_requests(today)?;

        let remaining_hourly =
            u64::from(self.limits.max_requests_per_identity_hour).saturating_sub(hourly + 1);
        let remaining_daily =
            u64::from(self.limits.max_requests_per_identity_day).saturating_sub(daily + 1);

        Ok(Verdict {
            admitted: true,
            message: format!(
                "OK (remaining: {remaining_hourly}/hour, {remaining_daily}/day)"
            ),
        })
    }

    /// Record spend against today's ledger.  Logs a warning once the total
    /// passes 80% of the daily ceiling.  Storage errors drop the update
    /// rather than propagate.
    pub fn add_cost(&self, amount: f64) {
        if amount < 0.0 {
            tracing::warn!(amount, "ignoring negative cost sample");
            return;
        }
        if amount == 0.0 {
            return;
        }

        let today = Local::now().date_naive();
        match self.store.add_cost(today, amount) {
            Ok(total) => {
                tracing::info!(amount, total, "cost recorded");
                if total > self.limits.max_daily_cost * 0.8 {
                    tracing::warn!(
                        total,
                        limit = self.limits.max_daily_cost,
                        "daily spend above 80% of ceiling"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, amount, "failed to record cost, dropping update");
            }
        }
    }

    /// Snapshot today's usage for the status surface.  Remaining values are
    /// clamped to zero.
    pub fn status(&self) -> Result<LimiterStatus> {
        let today = Local::now().date_naive();
        let stats = self.store.get_or_create_daily(today)?;
        let unique = self.store.unique_identities_on(today)?;

        Ok(LimiterStatus {
            daily_requests: stats.total_requests,
            daily_cost: stats.total_cost,
            unique_identities_today: unique,
            requests_remaining: self
                .limits
                .max_daily_requests
                .saturating_sub(stats.total_requests),
            cost_remaining: (self.limits.max_daily_cost - stats.total_cost).max(0.0),
            limits: ConfiguredLimits::from(&self.limits),
        })
    }

    /// Zero today's counters and drop request rows past the 7-day retention
    /// horizon.  Historical daily rows are untouched.
    pub fn reset_daily(&self) -> Result<()> {
        let today = Local::now().date_naive();
        let before = self.store.get_or_create_daily(today)?;
        tracing::info!(
            total_requests = before.total_requests,
            total_cost = before.total_cost,
            "resetting daily counters"
        );
        self.store.reset_day(today)?;
        let removed = self.store.purge_requests_older_than(REQUEST_RETENTION_DAYS)?;
        if removed > 0 {
            tracing::info!(removed, "purged old request rows during reset");
        }
        Ok(())
    }
}

fn reject(message: String) -> Verdict {
    Verdict {
        admitted: false,
        message,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
