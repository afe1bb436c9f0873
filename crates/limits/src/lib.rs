//! Admission control and cost accounting backed by a persistent counter store.
//!
//! [`store::CounterStore`] owns the SQLite tables (per-identity request log,
//! per-day aggregate counters).  [`limiter::RateLimiter`] layers the four
//! admission ceilings and the daily spend ledger on top of it.

pub mod limiter;
pub mod store;

pub use limiter::{ConfiguredLimits, LimiterStatus, RateLimiter, Verdict};
pub use store::{CounterStore, DailyStats, REQUEST_RETENTION_DAYS, STATS_RETENTION_DAYS};
