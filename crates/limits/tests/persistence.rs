//! Integration tests for the counter store: durability across re-open,
//! concurrent counter updates, and retention sweeps.  All tests run against
//! a real SQLite file in a temp directory.

use std::sync::Arc;

use chrono::{Local, Utc};

use tg_domain::config::LimitsConfig;
use tg_limits::{CounterStore, RateLimiter};

fn temp_store(dir: &tempfile::TempDir) -> Arc<CounterStore> {
    Arc::new(CounterStore::open(&dir.path().join("limits.db")).unwrap())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Durability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn counts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("limits.db");
    let today = Local::now().date_naive();
    let now = Utc::now();

    {
        let store = CounterStore::open(&path).unwrap();
        store.record_request("1.2.3.4", now).unwrap();
        store.record_request("1.2.3.4", now).unwrap();
        store.add_cost(today, 0.42).unwrap();
        store.increment_requests(today).unwrap();
        store.increment_requests(today).unwrap();
    } // store dropped — simulated restart

    let store = CounterStore::open(&path).unwrap();
    let hour_ago = now - chrono::Duration::hours(1);
    assert_eq!(store.count_requests_since("1.2.3.4", hour_ago).unwrap(), 2);

    let stats = store.get_or_create_daily(today).unwrap();
    assert_eq!(stats.total_requests, 2);
    assert!((stats.total_cost - 0.42).abs() < 1e-9);
}

#[test]
fn limiter_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("limits.db");
    let limits = LimitsConfig {
        max_requests_per_identity_hour: 2,
        max_requests_per_identity_day: 5,
        ..LimitsConfig::default()
    };

    {
        let store = Arc::new(CounterStore::open(&path).unwrap());
        let limiter = RateLimiter::new(store, limits.clone());
        assert!(limiter.check("1.2.3.4").admitted);
        assert!(limiter.check("1.2.3.4").admitted);
    }

    // After a restart the hourly window still holds the identity's history.
    let store = Arc::new(CounterStore::open(&path).unwrap());
    let limiter = RateLimiter::new(store, limits);
    let verdict = limiter.check("1.2.3.4");
    assert!(!verdict.admitted);
    assert!(verdict.message.contains("hour"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Concurrency — no lost updates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn concurrent_add_cost_sums_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let today = Local::now().date_naive();

    let threads = 8;
    let per_thread = 25;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..per_thread {
                    store.add_cost(today, 0.01).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stats = store.get_or_create_daily(today).unwrap();
    let expected = threads as f64 * per_thread as f64 * 0.01;
    assert!(
        (stats.total_cost - expected).abs() < 1e-6,
        "expected {expected}, got {}",
        stats.total_cost
    );
}

#[test]
fn concurrent_increments_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let today = Local::now().date_naive();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    store.increment_requests(today).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stats = store.get_or_create_daily(today).unwrap();
    assert_eq!(stats.total_requests, 200);
}

#[test]
fn concurrent_checks_match_recorded_total() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let limits = LimitsConfig {
        max_requests_per_identity_hour: 10_000,
        max_requests_per_identity_day: 10_000,
        max_daily_cost: 1_000.0,
        max_daily_requests: 10_000,
        ..LimitsConfig::default()
    };
    let limiter = Arc::new(RateLimiter::new(store.clone(), limits));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let limiter = limiter.clone();
            std::thread::spawn(move || {
                let identity = format!("10.0.0.{i}");
                let mut admitted = 0u64;
                for _ in 0..20 {
                    if limiter.check(&identity).admitted {
                        admitted += 1;
                    }
                }
                admitted
            })
        })
        .collect();
    let admitted_total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // Every admission — and only admissions — lands in the daily counter.
    let today = Local::now().date_naive();
    let stats = store.get_or_create_daily(today).unwrap();
    assert_eq!(admitted_total, 80);
    assert_eq!(stats.total_requests, 80);
}

#[test]
fn hourly_ceiling_holds_under_concurrent_checks() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let limits = LimitsConfig {
        max_requests_per_identity_hour: 25,
        max_requests_per_identity_day: 10_000,
        max_daily_cost: 1_000.0,
        max_daily_requests: 10_000,
        ..LimitsConfig::default()
    };
    let limiter = Arc::new(RateLimiter::new(store.clone(), limits));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let limiter = limiter.clone();
            std::thread::spawn(move || {
                let mut admitted = 0u64;
                for _ in 0..10 {
                    if limiter.check("8.8.8.8").admitted {
                        admitted += 1;
                    }
                }
                admitted
            })
        })
        .collect();
    let admitted_total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(admitted_total, 25, "admissions must stop exactly at the ceiling");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retention
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn retention_sweep_drops_old_rows_and_keeps_today() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let today = Local::now().date_naive();
    let now = Utc::now();

    // Old request rows and an aged-out stats row.
    store
        .record_request("old-ip", now - chrono::Duration::days(10))
        .unwrap();
    store
        .add_cost(today - chrono::Duration::days(31), 0.99)
        .unwrap();
    // Fresh state.
    store.record_request("fresh-ip", now).unwrap();
    store.add_cost(today, 0.10).unwrap();

    let removed = store.purge_older_than(7, 30).unwrap();
    assert_eq!(removed, 1);

    let week_ago = now - chrono::Duration::days(7);
    assert_eq!(store.count_requests_since("old-ip", week_ago - chrono::Duration::days(7)).unwrap(), 0);
    assert_eq!(store.count_requests_since("fresh-ip", week_ago).unwrap(), 1);

    // The purged stats row comes back zeroed if recreated; today's survives.
    let old = store
        .get_or_create_daily(today - chrono::Duration::days(31))
        .unwrap();
    assert!(old.total_cost.abs() < 1e-9);
    let fresh = store.get_or_create_daily(today).unwrap();
    assert!((fresh.total_cost - 0.10).abs() < 1e-9);
}

#[test]
fn reset_then_old_stats_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let limiter = RateLimiter::new(store.clone(), LimitsConfig::default());

    limiter.check("ip");
    limiter.add_cost(0.30);
    store
        .add_cost(Local::now().date_naive() - chrono::Duration::days(31), 0.88)
        .unwrap();

    store.purge_older_than(7, 30).unwrap();
    limiter.reset_daily().unwrap();

    let status = limiter.status().unwrap();
    assert_eq!(status.daily_requests, 0);
    assert!(status.daily_cost.abs() < 1e-9);

    let old = store
        .get_or_create_daily(Local::now().date_naive() - chrono::Duration::days(31))
        .unwrap();
    assert!(old.total_cost.abs() < 1e-9, "purged row must not resurface with data");
}
