//! Scan scheduling — `should_run` (spec.md §4.2) and the bounded
//! worker-pool guard a scan dispatches fetches through.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use vg_domain::clock::{Rng, ThreadRng};

use super::eta::eta_matches;
use super::query::{Query, QueryStatus};

/// Six-clause conjunction deciding whether `q` is due at `now`, drawing
/// jitter from the real thread-local RNG.
pub fn should_run(q: &Query, now: DateTime<Utc>) -> bool {
    should_run_with_rng(q, now, &ThreadRng)
}

/// Same as [`should_run`] but with an injectable [`Rng`], for
/// deterministic scheduler tests.
pub fn should_run_with_rng(q: &Query, now: DateTime<Utc>, rng: &dyn Rng) -> bool {
    // 1. Recovery fast-path.
    if matches!(q.status, QueryStatus::NeverRan | QueryStatus::ConnectionLost) && q.cycles_limit >= 0 {
        return true;
    }
    // 2. Disabled check.
    if q.cycles_limit < 0 {
        return false;
    }
    // 3. ETA gate.
    if !eta_matches(&q.eta, now) {
        return false;
    }
    // 4. Termination gate.
    if q.found && !q.is_recurring {
        return false;
    }
    // 5. Budget gate.
    if q.cycles_limit != 0 && q.cycles >= q.cycles_limit as u64 {
        return false;
    }
    // 6. Time gate.
    let elapsed = now.signed_duration_since(q.last_run);
    if q.found {
        elapsed > chrono::Duration::minutes(q.cooldown)
    } else {
        let jitter = jitter_minutes(q.randomize, q.interval, rng);
        elapsed > chrono::Duration::minutes(q.interval) + chrono::Duration::seconds((jitter * 60.0) as i64)
    }
}

/// `jitter = uniform(-randomize*interval, +randomize*interval) * 0.01`.
pub fn jitter_minutes(randomize: u8, interval: i64, rng: &dyn Rng) -> f64 {
    let bound = randomize as f64 * interval as f64;
    if bound == 0.0 {
        return 0.0;
    }
    rng.uniform(-bound, bound) * 0.01
}

/// Outcome of executing one due query, applied by the Monitor after the
/// fetch completes.
pub struct RunOutcome {
    pub found: bool,
    pub status: QueryStatus,
}

/// Apply a completed run's outcome to `q` in place (spec.md §4.2
/// "When executed"). `now` is the instant the run completed.
pub fn apply_run(q: &mut Query, outcome: RunOutcome, now: DateTime<Utc>) {
    let previous_found = q.found;

    q.last_run = now;
    if matches!(outcome.status, QueryStatus::Ok | QueryStatus::AccessDenied) {
        q.cycles += 1;
    }

    if outcome.found || (q.is_recurring && !previous_found) {
        q.last_match_datetime = now;
    }

    q.found = outcome.found;
    q.status = outcome.status;
    q.is_new = true;
}

/// Mark a query skipped by this scan (not due).
pub fn mark_skipped(q: &mut Query) {
    q.is_new = false;
}

/// Bounded worker-pool guard: caps the number of concurrently in-flight
/// fetches within one `scan()` call. Mirrors a simple counting
/// semaphore built on an atomic rather than pulling in a new
/// synchronization primitive for a single counter.
pub struct ConcurrencyGuard {
    limit: u32,
    in_flight: Arc<AtomicU32>,
}

impl ConcurrencyGuard {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Block (via async spin-yield) until a slot is free, then acquire
    /// it. Returns a token that releases the slot on drop.
    pub async fn acquire(&self) -> ConcurrencyPermit {
        loop {
            let current = self.in_flight.load(Ordering::Acquire);
            if current < self.limit
                && self
                    .in_flight
                    .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                return ConcurrencyPermit {
                    in_flight: self.in_flight.clone(),
                };
            }
            tokio::task::yield_now().await;
        }
    }
}

pub struct ConcurrencyPermit {
    in_flight: Arc<AtomicU32>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::eta::Eta;
    use crate::monitor::query::MatchMode;

    fn base_query(now: DateTime<Utc>) -> Query {
        Query {
            uid: "u1".into(),
            alias: "a".into(),
            url: "http://x".into(),
            target_url: "http://x".into(),
            sequence: "world".into(),
            mode: MatchMode::Exists,
            min_matches: 1,
            interval: 15,
            cooldown: 15,
            randomize: 0,
            eta: Eta::default(),
            cycles_limit: 0,
            cycles: 0,
            is_recurring: false,
            last_run: now - chrono::Duration::minutes(30),
            last_match_datetime: Query::epoch(),
            found: false,
            status: QueryStatus::NeverRan,
            is_new: false,
            cookies_filename: String::new(),
            alert_sound: String::new(),
        }
    }

    #[test]
    fn never_ran_always_runs() {
        let now = Utc::now();
        let q = base_query(now);
        assert!(should_run(&q, now));
    }

    #[test]
    fn negative_cycles_limit_disables() {
        let now = Utc::now();
        let mut q = base_query(now);
        q.status = QueryStatus::Ok;
        q.cycles_limit = -1;
        assert!(!should_run(&q, now));
    }

    #[test]
    fn connection_lost_retries_immediately() {
        let now = Utc::now();
        let mut q = base_query(now);
        q.status = QueryStatus::ConnectionLost;
        q.last_run = now;
        assert!(should_run(&q, now));
    }

    #[test]
    fn budget_gate_blocks_when_exhausted() {
        let now = Utc::now();
        let mut q = base_query(now);
        q.status = QueryStatus::Ok;
        q.cycles_limit = 2;
        q.cycles = 2;
        q.last_run = now - chrono::Duration::minutes(30);
        assert!(!should_run(&q, now));
    }

    #[test]
    fn terminated_non_recurring_never_runs_again() {
        let now = Utc::now();
        let mut q = base_query(now);
        q.status = QueryStatus::Ok;
        q.found = true;
        q.is_recurring = false;
        assert!(!should_run(&q, now));
    }

    #[test]
    fn cooldown_gate_after_match() {
        let now = Utc::now();
        let mut q = base_query(now);
        q.status = QueryStatus::Ok;
        q.found = true;
        q.is_recurring = true;
        q.cooldown = 60;
        q.last_run = now - chrono::Duration::minutes(30);
        assert!(!should_run(&q, now));
        q.last_run = now - chrono::Duration::minutes(90);
        assert!(should_run(&q, now));
    }

    #[test]
    fn interval_gate_without_match() {
        let now = Utc::now();
        let mut q = base_query(now);
        q.status = QueryStatus::Ok;
        q.interval = 15;
        q.randomize = 0;
        q.last_run = now - chrono::Duration::minutes(10);
        assert!(!should_run(&q, now));
        q.last_run = now - chrono::Duration::minutes(20);
        assert!(should_run(&q, now));
    }

    #[test]
    fn apply_run_consumes_cycle_on_ok_not_on_connection_lost() {
        let now = Utc::now();
        let mut q = base_query(now);
        apply_run(
            &mut q,
            RunOutcome { found: true, status: QueryStatus::Ok },
            now,
        );
        assert_eq!(q.cycles, 1);
        assert!(q.is_new);
        assert_eq!(q.last_match_datetime, now);

        let before = q.cycles;
        apply_run(
            &mut q,
            RunOutcome { found: false, status: QueryStatus::ConnectionLost },
            now,
        );
        assert_eq!(q.cycles, before);
    }

    #[test]
    fn apply_run_edge_triggers_recurring_rearm() {
        // spec.md §4.2: last_match_datetime also advances when the query
        // is recurring and the previous cycle's `found` was false, even
        // if this cycle itself did not match (the re-arm edge trigger).
        let now = Utc::now();
        let mut q = base_query(now);
        q.is_recurring = true;
        q.found = false;
        apply_run(
            &mut q,
            RunOutcome { found: false, status: QueryStatus::Ok },
            now,
        );
        assert_eq!(q.last_match_datetime, now);
    }

    #[test]
    fn apply_run_no_edge_trigger_when_not_recurring() {
        let now = Utc::now();
        let mut q = base_query(now);
        q.is_recurring = false;
        q.found = false;
        apply_run(
            &mut q,
            RunOutcome { found: false, status: QueryStatus::Ok },
            now,
        );
        assert_eq!(q.last_match_datetime, Query::epoch());
    }

    #[tokio::test]
    async fn concurrency_guard_caps_in_flight() {
        let guard = Arc::new(ConcurrencyGuard::new(2));
        let p1 = guard.acquire().await;
        let p2 = guard.acquire().await;
        let g2 = guard.clone();
        let handle = tokio::spawn(async move { g2.acquire().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(p1);
        let p3 = handle.await.unwrap();
        drop(p2);
        drop(p3);
    }
}
