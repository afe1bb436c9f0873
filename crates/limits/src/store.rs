//! SQLite-backed counter store.
//!
//! Two tables: `requests` is an append-only log of admitted requests keyed by
//! identity, used for rolling-window counts and retained 7 days; `daily_stats`
//! holds one aggregate row per calendar date (request count, spend), retained
//! 30 days.  All mutation goes through a single `Mutex<Connection>`, so
//! read-modify-write sequences are serialized within the process, and each
//! counter update is a single SQL statement, so concurrent processes cannot
//! lose updates either.

use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;

use tg_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request rows are kept this long for rolling-window counts.
pub const REQUEST_RETENTION_DAYS: i64 = 7;

/// Daily aggregate rows are kept this long for history.
pub const STATS_RETENTION_DAYS: i64 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Aggregate counters for a single calendar date.
#[derive(Debug, Clone, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_requests: u64,
    pub total_cost: f64,
    pub last_updated: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CounterStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Durable request/spend counters that survive process restarts.
pub struct CounterStore {
    conn: Mutex<Connection>,
}

impl CounterStore {
    /// Open (or create) the store at `path`, creating parent directories,
    /// the schema, and the `(identity, ts)` / `(ts)` / `(date)` indexes.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(Error::Io)?;
            }
        }
        let conn = Connection::open(path).map_err(sql_err)?;
        let store = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "counter store opened");
        Ok(store)
    }

    /// In-memory store for tests and ephemeral runs.  No durability.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // WAL allows concurrent readers while a writer holds the lock.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(sql_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(sql_err)?;
        // Bounded wait on a contended database file, then error out and let
        // the caller's fail-open path take over.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(sql_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS requests (
                 id       INTEGER PRIMARY KEY AUTOINCREMENT,
                 identity TEXT NOT NULL,
                 ts       INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_requests_identity_ts
                 ON requests (identity, ts);
             CREATE INDEX IF NOT EXISTS idx_requests_ts
                 ON requests (ts);
             CREATE TABLE IF NOT EXISTS daily_stats (
                 date           TEXT PRIMARY KEY,
                 total_requests INTEGER NOT NULL DEFAULT 0,
                 total_cost     REAL NOT NULL DEFAULT 0.0,
                 last_updated   INTEGER NOT NULL
             );",
        )
        .map_err(sql_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── Request log ───────────────────────────────────────────────────

    /// Append one admitted request for `identity` at instant `at`.
    pub fn record_request(&self, identity: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO requests (identity, ts) VALUES (?1, ?2)",
            params![identity, at.timestamp()],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Number of requests for `identity` strictly after `since`.
    pub fn count_requests_since(&self, identity: &str, since: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM requests WHERE identity = ?1 AND ts > ?2",
                params![identity, since.timestamp()],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count as u64)
    }

    /// Number of distinct identities with a request on the given local date.
    pub fn unique_identities_on(&self, date: NaiveDate) -> Result<u64> {
        let (start, end) = local_day_bounds(date);
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT identity) FROM requests
                 WHERE ts >= ?1 AND ts < ?2",
                params![start, end],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count as u64)
    }

    // ── Daily aggregates ──────────────────────────────────────────────

    /// Fetch the aggregate row for `date`, creating a zeroed one if absent.
    /// Idempotent under concurrent callers: exactly one row per date.
    pub fn get_or_create_daily(&self, date: NaiveDate) -> Result<DailyStats> {
        let conn = self.conn.lock();
        ensure_daily_row(&conn, date)?;
        conn.query_row(
            "SELECT date, total_requests, total_cost, last_updated
             FROM daily_stats WHERE date = ?1",
            params![date.to_string()],
            row_to_stats,
        )
        .map_err(sql_err)
    }

    /// Atomically add `amount` to the date's spend; returns the new total.
    pub fn add_cost(&self, date: NaiveDate, amount: f64) -> Result<f64> {
        let conn = self.conn.lock();
        ensure_daily_row(&conn, date)?;
        conn.execute(
            "UPDATE daily_stats
             SET total_cost = total_cost + ?2, last_updated = ?3
             WHERE date = ?1",
            params![date.to_string(), amount, Utc::now().timestamp()],
        )
        .map_err(sql_err)?;
        conn.query_row(
            "SELECT total_cost FROM daily_stats WHERE date = ?1",
            params![date.to_string()],
            |row| row.get(0),
        )
        .map_err(sql_err)
    }

    /// Atomically bump the date's admitted-request counter; returns the new total.
    pub fn increment_requests(&self, date: NaiveDate) -> Result<u64> {
        let conn = self.conn.lock();
        ensure_daily_row(&conn, date)?;
        conn.execute(
            "UPDATE daily_stats
             SET total_requests = total_requests + 1, last_updated = ?2
             WHERE date = ?1",
            params![date.to_string(), Utc::now().timestamp()],
        )
        .map_err(sql_err)?;
        let total: i64 = conn
            .query_row(
                "SELECT total_requests FROM daily_stats WHERE date = ?1",
                params![date.to_string()],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(total as u64)
    }

    /// Zero the counters for one date.  Historical rows are untouched.
    pub fn reset_day(&self, date: NaiveDate) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO daily_stats (date, total_requests, total_cost, last_updated)
             VALUES (?1, 0, 0.0, ?2)
             ON CONFLICT(date) DO UPDATE SET
                 total_requests = 0,
                 total_cost = 0.0,
                 last_updated = excluded.last_updated",
            params![date.to_string(), Utc::now().timestamp()],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    // ── Retention ─────────────────────────────────────────────────────

    /// Delete request rows older than `days`.  Returns rows removed.
    pub fn purge_requests_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).timestamp();
        let conn = self.conn.lock();
        conn.execute("DELETE FROM requests WHERE ts < ?1", params![cutoff])
            .map_err(sql_err)
    }

    /// Full retention sweep: request rows beyond `request_days`, aggregate
    /// rows beyond `stats_days`, then compaction.  Returns request rows removed.
    ///
    /// Each statement takes its own short lock so concurrent admission
    /// checks interleave with the sweep instead of queueing behind it.
    pub fn purge_older_than(&self, request_days: i64, stats_days: i64) -> Result<usize> {
        let removed = self.purge_requests_older_than(request_days)?;
        let cutoff_date = (Local::now().date_naive() - chrono::Duration::days(stats_days))
            .to_string();
        {
            let conn = self.conn.lock();
            conn.execute(
                "DELETE FROM daily_stats WHERE date < ?1",
                params![cutoff_date],
            )
            .map_err(sql_err)?;
        }
        self.conn.lock().execute_batch("VACUUM").map_err(sql_err)?;
        Ok(removed)
    }

    // ── Test support ──────────────────────────────────────────────────

    /// Run arbitrary SQL against the underlying connection.  Used by tests
    /// to break the schema and exercise the storage-failure paths.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql).map_err(sql_err)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Create the date's row if it does not exist yet.  `INSERT OR IGNORE`
/// keeps this idempotent under races from other processes.
fn ensure_daily_row(conn: &Connection, date: NaiveDate) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO daily_stats (date, total_requests, total_cost, last_updated)
         VALUES (?1, 0, 0.0, ?2)",
        params![date.to_string(), Utc::now().timestamp()],
    )
    .map_err(sql_err)?;
    Ok(())
}

fn row_to_stats(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyStats> {
    let date_str: String = row.get(0)?;
    let total_requests: i64 = row.get(1)?;
    let total_cost: f64 = row.get(2)?;
    let last_updated: i64 = row.get(3)?;
    Ok(DailyStats {
        date: date_str.parse().unwrap_or_default(),
        total_requests: total_requests as u64,
        total_cost,
        last_updated: DateTime::from_timestamp(last_updated, 0)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

/// Unix-timestamp bounds `[start, end)` of a local calendar date.
fn local_day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = date.and_time(NaiveTime::MIN);
    let end = start + chrono::Duration::days(1);
    (to_local_ts(start), to_local_ts(end))
}

fn to_local_ts(naive: NaiveDateTime) -> i64 {
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.timestamp())
        // DST gap: fall back to the UTC reading of the same wall time.
        .unwrap_or_else(|| naive.and_utc().timestamp())
}

fn sql_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_count_requests() {
        let store = CounterStore::in_memory().unwrap();
        let now = Utc::now();

        store.record_request("1.2.3.4", now).unwrap();
        store.record_request("1.2.3.4", now).unwrap();
        store.record_request("5.6.7.8", now).unwrap();

        let hour_ago = now - chrono::Duration::hours(1);
        assert_eq!(store.count_requests_since("1.2.3.4", hour_ago).unwrap(), 2);
        assert_eq!(store.count_requests_since("5.6.7.8", hour_ago).unwrap(), 1);
        assert_eq!(store.count_requests_since("9.9.9.9", hour_ago).unwrap(), 0);
    }

    #[test]
    fn count_excludes_rows_at_or_before_cutoff() {
        let store = CounterStore::in_memory().unwrap();
        let now = Utc::now();
        let old = now - chrono::Duration::hours(2);

        store.record_request("ip", old).unwrap();
        store.record_request("ip", now).unwrap();

        let hour_ago = now - chrono::Duration::hours(1);
        assert_eq!(store.count_requests_since("ip", hour_ago).unwrap(), 1);
    }

    #[test]
    fn get_or_create_daily_is_idempotent() {
        let store = CounterStore::in_memory().unwrap();
        let date = Local::now().date_naive();

        let first = store.get_or_create_daily(date).unwrap();
        let second = store.get_or_create_daily(date).unwrap();

        assert_eq!(first.total_requests, 0);
        assert_eq!(second.total_requests, 0);
        assert_eq!(first.date, second.date);
    }

    #[test]
    fn add_cost_accumulates_and_returns_total() {
        let store = CounterStore::in_memory().unwrap();
        let date = Local::now().date_naive();

        let t1 = store.add_cost(date, 0.85).unwrap();
        assert!((t1 - 0.85).abs() < 1e-9);
        let t2 = store.add_cost(date, 0.20).unwrap();
        assert!((t2 - 1.05).abs() < 1e-9);

        let stats = store.get_or_create_daily(date).unwrap();
        assert!((stats.total_cost - 1.05).abs() < 1e-9);
    }

    #[test]
    fn increment_requests_counts_up() {
        let store = CounterStore::in_memory().unwrap();
        let date = Local::now().date_naive();

        assert_eq!(store.increment_requests(date).unwrap(), 1);
        assert_eq!(store.increment_requests(date).unwrap(), 2);
        assert_eq!(store.increment_requests(date).unwrap(), 3);
    }

    #[test]
    fn dates_have_independent_rows() {
        let store = CounterStore::in_memory().unwrap();
        let today = Local::now().date_naive();
        let yesterday = today - chrono::Duration::days(1);

        store.add_cost(yesterday, 0.50).unwrap();
        store.add_cost(today, 0.10).unwrap();

        let y = store.get_or_create_daily(yesterday).unwrap();
        let t = store.get_or_create_daily(today).unwrap();
        assert!((y.total_cost - 0.50).abs() < 1e-9);
        assert!((t.total_cost - 0.10).abs() < 1e-9);
    }

    #[test]
    fn reset_day_zeroes_only_that_date() {
        let store = CounterStore::in_memory().unwrap();
        let today = Local::now().date_naive();
        let yesterday = today - chrono::Duration::days(1);

        store.add_cost(today, 0.75).unwrap();
        store.increment_requests(today).unwrap();
        store.add_cost(yesterday, 0.33).unwrap();

        store.reset_day(today).unwrap();

        let t = store.get_or_create_daily(today).unwrap();
        assert_eq!(t.total_requests, 0);
        assert!(t.total_cost.abs() < 1e-9);

        let y = store.get_or_create_daily(yesterday).unwrap();
        assert!((y.total_cost - 0.33).abs() < 1e-9);
    }

    #[test]
    fn purge_removes_old_requests_only() {
        let store = CounterStore::in_memory().unwrap();
        let now = Utc::now();
        let old = now - chrono::Duration::days(8);

        store.record_request("ip", old).unwrap();
        store.record_request("ip", now).unwrap();

        let removed = store.purge_requests_older_than(7).unwrap();
        assert_eq!(removed, 1);

        let day_ago = now - chrono::Duration::hours(24);
        assert_eq!(store.count_requests_since("ip", day_ago).unwrap(), 1);
    }

    #[test]
    fn unique_identities_counts_distinct() {
        let store = CounterStore::in_memory().unwrap();
        let now = Utc::now();

        store.record_request("a", now).unwrap();
        store.record_request("a", now).unwrap();
        store.record_request("b", now).unwrap();

        let today = Local::now().date_naive();
        assert_eq!(store.unique_identities_on(today).unwrap(), 2);
    }

    #[test]
    fn storage_failure_surfaces_as_error() {
        let store = CounterStore::in_memory().unwrap();
        store.execute_raw("DROP TABLE requests").unwrap();
        let err = store.record_request("ip", Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
