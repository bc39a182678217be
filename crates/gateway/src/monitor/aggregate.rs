//! Monitor — the per-user aggregate (spec.md §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use vg_domain::clock::Clock;

use crate::fetch::Fetch;
use crate::storage::{cookies as cookies_storage, Storage};

use super::matching::MatchEngine;
use super::query::{MatchMode, Query, QueryStatus};
use super::scheduler::{self, RunOutcome};
use super::validate::{self, ValidateContext};

/// The per-user aggregate. Mutators (`add_query`/`edit_query`/
/// `delete_query`/`restore_query`) and `scan` are all serialized
/// against each other through `mutate_lock`, matching spec.md §5's
/// ordering guarantee.
pub struct Monitor {
    username: String,
    queries: RwLock<IndexMap<String, Query>>,
    storage: Storage,
    fetcher: Arc<dyn Fetch>,
    captcha_keywords: RwLock<Vec<String>>,
    min_interval_minutes: i64,
    max_concurrent_fetches: u32,
    clock: Arc<dyn Clock>,
    mutate_lock: tokio::sync::Mutex<()>,
}

impl Monitor {
    pub fn new(
        username: String,
        storage: Storage,
        fetcher: Arc<dyn Fetch>,
        captcha_keywords: Vec<String>,
        min_interval_minutes: i64,
        max_concurrent_fetches: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            username,
            queries: RwLock::new(IndexMap::new()),
            storage,
            fetcher,
            captcha_keywords: RwLock::new(captcha_keywords),
            min_interval_minutes,
            max_concurrent_fetches,
            clock,
            mutate_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn alias_index(&self) -> HashMap<String, String> {
        self.queries
            .read()
            .await
            .iter()
            .map(|(uid, q)| (q.alias.clone(), uid.clone()))
            .collect()
    }

    fn join_message(base: &str, warnings: &[String]) -> String {
        if warnings.is_empty() {
            base.to_string()
        } else {
            format!("{base}; warnings: {}", warnings.join("; "))
        }
    }

    /// `add_query(params) -> (ok, message)`.
    pub async fn add_query(&self, params: Map<String, Value>) -> (bool, String) {
        let _guard = self.mutate_lock.lock().await;
        let aliases = self.alias_index().await;
        let ctx = ValidateContext {
            min_interval_minutes: self.min_interval_minutes,
            existing_aliases: &aliases,
            exclude_uid: None,
        };

        let (fields, warnings) = match validate::validate(&params, &ctx) {
            Ok(v) => v,
            Err(e) => return (false, e),
        };

        let uid = params
            .get("uid")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let cookies_filename = params
            .get("cookies_filename")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.storage.derive_cookies_filename(&fields.url));

        let alert_sound = params
            .get("alert_sound")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "default.wav".to_string());

        let query = Query {
            uid: uid.clone(),
            alias: fields.alias,
            url: fields.url,
            target_url: fields.target_url,
            sequence: fields.sequence,
            mode: fields.mode,
            min_matches: fields.min_matches,
            interval: fields.interval,
            cooldown: fields.cooldown,
            randomize: fields.randomize,
            eta: fields.eta,
            cycles_limit: fields.cycles_limit,
            cycles: 0,
            is_recurring: fields.is_recurring,
            last_run: Query::epoch(),
            last_match_datetime: Query::epoch(),
            found: false,
            status: QueryStatus::NeverRan,
            is_new: false,
            cookies_filename,
            alert_sound,
        };

        self.queries.write().await.insert(uid, query);
        (true, Self::join_message("query added", &warnings))
    }

    /// `edit_query(params) -> (ok, message)`. `params` must contain
    /// `uid`; missing fields fall back to the existing record's values.
    pub async fn edit_query(&self, params: Map<String, Value>) -> (bool, String) {
        let _guard = self.mutate_lock.lock().await;
        let uid = match params.get("uid").and_then(|v| v.as_str()) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => return (false, "uid is required".to_string()),
        };

        let existing = {
            let queries = self.queries.read().await;
            match queries.get(&uid) {
                Some(q) => q.clone(),
                None => return (false, format!("unknown uid \"{uid}\"")),
            }
        };

        let mut merged = existing.to_params();
        for (k, v) in params.iter() {
            if k == "uid" {
                continue;
            }
            merged.insert(k.clone(), v.clone());
        }

        let aliases = self.alias_index().await;
        let ctx = ValidateContext {
            min_interval_minutes: self.min_interval_minutes,
            existing_aliases: &aliases,
            exclude_uid: Some(&uid),
        };

        let (fields, warnings) = match validate::validate(&merged, &ctx) {
            Ok(v) => v,
            Err(e) => return (false, e),
        };

        let updated = Query {
            uid: uid.clone(),
            alias: fields.alias,
            url: fields.url,
            target_url: fields.target_url,
            sequence: fields.sequence,
            mode: fields.mode,
            min_matches: fields.min_matches,
            interval: fields.interval,
            cooldown: fields.cooldown,
            randomize: fields.randomize,
            eta: fields.eta,
            cycles_limit: fields.cycles_limit,
            cycles: existing.cycles,
            is_recurring: fields.is_recurring,
            last_run: existing.last_run,
            last_match_datetime: existing.last_match_datetime,
            found: existing.found,
            status: existing.status,
            is_new: existing.is_new,
            cookies_filename: existing.cookies_filename,
            alert_sound: existing.alert_sound,
        };

        self.queries.write().await.insert(uid, updated);
        (true, Self::join_message("query updated", &warnings))
    }

    /// `delete_query(uid) -> (ok, message)`.
    pub async fn delete_query(&self, uid: &str) -> (bool, String) {
        let _guard = self.mutate_lock.lock().await;
        match self.queries.write().await.shift_remove(uid) {
            Some(_) => (true, "query deleted".to_string()),
            None => (false, format!("unknown uid \"{uid}\"")),
        }
    }

    /// `restore_query(params) -> (ok, message)`: same as add, but keeps
    /// `uid`, `cycles`, `last_run`, `last_match_datetime`, `found` from
    /// `params` rather than resetting them. Used by `populate`.
    pub async fn restore_query(&self, params: Map<String, Value>) -> (bool, String) {
        let _guard = self.mutate_lock.lock().await;
        let aliases = self.alias_index().await;
        let ctx = ValidateContext {
            min_interval_minutes: self.min_interval_minutes,
            existing_aliases: &aliases,
            exclude_uid: None,
        };

        let (fields, warnings) = match validate::validate(&params, &ctx) {
            Ok(v) => v,
            Err(e) => return (false, e),
        };

        let uid = params
            .get("uid")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let cycles = params.get("cycles").and_then(|v| v.as_u64()).unwrap_or(0);
        let last_run = params
            .get("last_run")
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(Query::epoch);
        let last_match_datetime = params
            .get("last_match_datetime")
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(Query::epoch);
        let found = params.get("found").and_then(|v| v.as_bool()).unwrap_or(false);
        let status = params
            .get("status")
            .and_then(|v| v.as_i64())
            .map(|v| QueryStatus::from_i32(v as i32))
            .unwrap_or(QueryStatus::NeverRan);
        let cookies_filename = params
            .get("cookies_filename")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let alert_sound = params
            .get("alert_sound")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("default.wav")
            .to_string();

        let query = Query {
            uid: uid.clone(),
            alias: fields.alias,
            url: fields.url,
            target_url: fields.target_url,
            sequence: fields.sequence,
            mode: fields.mode,
            min_matches: fields.min_matches,
            interval: fields.interval,
            cooldown: fields.cooldown,
            randomize: fields.randomize,
            eta: fields.eta,
            cycles_limit: fields.cycles_limit,
            cycles,
            is_recurring: fields.is_recurring,
            last_run,
            last_match_datetime,
            found,
            status,
            is_new: false,
            cookies_filename,
            alert_sound,
        };

        self.queries.write().await.insert(uid, query);
        (true, Self::join_message("query restored", &warnings))
    }

    /// `scan() -> (snapshot, message)`: concurrently evaluate every due
    /// query, update state, return a snapshot preserving insertion
    /// order (spec.md §4.2, §5).
    pub async fn scan(&self) -> (IndexMap<String, Query>, String) {
        let _guard = self.mutate_lock.lock().await;
        let now = self.clock.now();

        let due_uids: Vec<String> = {
            let queries = self.queries.read().await;
            queries
                .iter()
                .filter(|(_, q)| scheduler::should_run(q, now))
                .map(|(uid, _)| uid.clone())
                .collect()
        };

        let keywords = self.captcha_keywords.read().await.clone();
        let concurrency = Arc::new(scheduler::ConcurrencyGuard::new(self.max_concurrent_fetches));

        let mut handles = Vec::with_capacity(due_uids.len());
        for uid in &due_uids {
            let (url, sequence, mode, min_matches, cookies_filename) = {
                let queries = self.queries.read().await;
                let q = &queries[uid];
                (
                    q.url.clone(),
                    q.sequence.clone(),
                    q.mode,
                    q.min_matches,
                    q.cookies_filename.clone(),
                )
            };
            let fetcher = self.fetcher.clone();
            let storage = self.storage.clone();
            let concurrency = concurrency.clone();
            let keywords = keywords.clone();

            let handle = tokio::spawn(async move {
                let _permit = concurrency.acquire().await;
                let cookie_map = storage.load_cookies(&cookies_filename).unwrap_or_default();
                let cookie_header = if cookie_map.is_empty() {
                    None
                } else {
                    Some(cookies_storage::to_header_value(&cookie_map))
                };

                let outcome = fetcher.fetch(&url, cookie_header.as_deref()).await;
                run_outcome_from_fetch(outcome, &sequence, mode, min_matches, &keywords)
            });
            handles.push(handle);
        }

        let mut outcomes: HashMap<String, RunOutcome> = HashMap::new();
        for (uid, handle) in due_uids.iter().zip(handles.into_iter()) {
            let outcome = match handle.await {
                Ok(o) => o,
                Err(e) => {
                    warn!(uid, error = %e, "scan task panicked");
                    RunOutcome {
                        found: false,
                        status: QueryStatus::ConnectionLost,
                    }
                }
            };
            outcomes.insert(uid.clone(), outcome);
        }

        let mut queries = self.queries.write().await;
        for (uid, q) in queries.iter_mut() {
            match outcomes.remove(uid) {
                Some(outcome) => scheduler::apply_run(q, outcome, now),
                None => scheduler::mark_skipped(q),
            }
        }

        info!(username = %self.username, due = due_uids.len(), "scan complete");
        (queries.clone(), format!("scan complete: {} due", due_uids.len()))
    }

    /// `clean_queries() -> (ok, message)`: retains queries where
    /// `found=false` or `is_recurring=true`.
    pub async fn clean_queries(&self) -> (bool, String) {
        let _guard = self.mutate_lock.lock().await;
        let mut queries = self.queries.write().await;
        let before = queries.len();
        queries.retain(|_, q| !q.found || q.is_recurring);
        let removed = before - queries.len();
        (true, format!("removed {removed} queries"))
    }

    /// `save() -> (ok, message)`: persist the dashboard table.
    pub async fn save(&self) -> (bool, String) {
        let _guard = self.mutate_lock.lock().await;
        let rows: Vec<_> = {
            let queries = self.queries.read().await;
            queries
                .values()
                .map(crate::storage::DashboardRow::from_query)
                .collect()
        };
        match self.storage.save_dashboard(&self.username, &rows) {
            Ok(()) => (true, "saved".to_string()),
            Err(e) => (false, format!("save failed: {e}")),
        }
    }

    /// `populate() -> (ok, message)`: load dashboard rows and
    /// `restore_query` each.
    pub async fn populate(&self) -> (bool, String) {
        let rows = match self.storage.load_dashboard(&self.username) {
            Ok(r) => r,
            Err(e) => return (false, format!("load failed: {e}")),
        };
        let mut all_ok = true;
        let mut messages = Vec::new();
        for row in rows {
            let params = row.into_params();
            let (ok, msg) = self.restore_query(params).await;
            if !ok {
                all_ok = false;
                messages.push(msg);
            }
        }
        if all_ok {
            (true, "populated".to_string())
        } else {
            (false, messages.join("; "))
        }
    }

    /// `reload_cookies(map) -> (ok, message)`: hand `{cookies_filename
    /// -> {name->value}}` to storage without touching queries.
    pub async fn reload_cookies(&self, map: HashMap<String, HashMap<String, String>>) -> (bool, String) {
        for (filename, values) in &map {
            if let Err(e) = self.storage.save_cookies(filename, values) {
                return (false, format!("reload_cookies failed for {filename}: {e}"));
            }
        }
        (true, "cookies reloaded".to_string())
    }

    /// `get_sound_file(name) -> (bytes, filename)`.
    pub fn get_sound_file(&self, name: &str) -> vg_domain::Result<(Vec<u8>, String)> {
        self.storage.get_sound(name)
    }

    /// Fan out a config reload to the derived globals every query
    /// indirectly depends on (spec.md §4.7).
    pub async fn reload_config(&self, captcha_keywords: Vec<String>) {
        *self.captcha_keywords.write().await = captcha_keywords;
    }

    pub async fn get_query(&self, uid: &str) -> Option<Query> {
        self.queries.read().await.get(uid).cloned()
    }

    pub async fn all_queries(&self) -> IndexMap<String, Query> {
        self.queries.read().await.clone()
    }
}

fn run_outcome_from_fetch(
    outcome: crate::fetch::FetchOutcome,
    sequence: &str,
    mode: MatchMode,
    min_matches: u32,
    keywords: &[String],
) -> RunOutcome {
    if matches!(outcome.status, QueryStatus::ConnectionLost) {
        return RunOutcome {
            found: false,
            status: QueryStatus::ConnectionLost,
        };
    }

    let engine = match MatchEngine::compile(sequence) {
        Ok(e) => e,
        Err(_) => {
            return RunOutcome {
                found: false,
                status: QueryStatus::Ok,
            }
        }
    };

    let (found, total) = engine.evaluate(&outcome.text, mode, min_matches);
    if total == 0 && MatchEngine::looks_access_denied(&outcome.text, keywords) {
        RunOutcome {
            found: false,
            status: QueryStatus::AccessDenied,
        }
    } else {
        RunOutcome {
            found,
            status: QueryStatus::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FakeFetcher, FetchOutcome};
    use serde_json::json;
    use vg_domain::clock::FrozenClock;

    /// Builds a Monitor over a directory that is never written to by
    /// these tests (none of them call `save`/`reload_cookies`), so a
    /// throwaway path is fine without tying a TempDir's lifetime in.
    fn monitor(clock: Arc<FrozenClock>, fetcher: Arc<dyn Fetch>) -> Monitor {
        let storage = Storage::new(std::env::temp_dir().join("vigil-aggregate-tests"), "default.wav".to_string());
        Monitor::new(
            "alice".to_string(),
            storage,
            fetcher,
            vec!["permission denied".to_string()],
            5,
            4,
            clock,
        )
    }

    #[tokio::test]
    async fn add_match_rearm() {
        // spec.md §8 scenario 1.
        let start: chrono::DateTime<chrono::Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let clock = Arc::new(FrozenClock::new(start));
        let fetcher = Arc::new(FakeFetcher::new(vec![FetchOutcome {
            text: "a world away".into(),
            status: QueryStatus::Ok,
        }]));
        let m = monitor(clock.clone(), fetcher);

        let (ok, _) = m
            .add_query(
                serde_json::from_value(json!({
                    "url": "http://x", "sequence": "world", "interval": "15", "is_recurring": true
                }))
                .unwrap(),
            )
            .await;
        assert!(ok);

        let (snapshot, _) = m.scan().await;
        let q = snapshot.values().next().unwrap();
        assert!(q.found);
        assert_eq!(q.cycles, 1);
        assert_eq!(q.last_match_datetime, start);

        clock.advance(chrono::Duration::minutes(20));
        let (snapshot, _) = m.scan().await;
        let q = snapshot.values().next().unwrap();
        assert_eq!(q.status, QueryStatus::Ok);
        assert_eq!(q.cycles, 2);
    }

    #[tokio::test]
    async fn access_denied_gating() {
        // spec.md §8 scenario 2.
        let start: chrono::DateTime<chrono::Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let clock = Arc::new(FrozenClock::new(start));
        let fetcher = Arc::new(FakeFetcher::new(vec![FetchOutcome {
            text: "sorry, permission denied".into(),
            status: QueryStatus::Ok,
        }]));
        let m = monitor(clock, fetcher);

        m.add_query(
            serde_json::from_value(json!({
                "url": "http://x", "sequence": "world", "interval": "15", "is_recurring": true
            }))
            .unwrap(),
        )
        .await;

        let (snapshot, _) = m.scan().await;
        let q = snapshot.values().next().unwrap();
        assert!(!q.found);
        assert_eq!(q.status, QueryStatus::AccessDenied);
        assert_eq!(q.cycles, 1);
    }

    #[tokio::test]
    async fn connection_lost_fast_retry() {
        // spec.md §8 scenario 3.
        let start: chrono::DateTime<chrono::Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let clock = Arc::new(FrozenClock::new(start));
        let fetcher = Arc::new(FakeFetcher::new(vec![FetchOutcome {
            text: String::new(),
            status: QueryStatus::ConnectionLost,
        }]));
        let m = monitor(clock, fetcher);

        m.add_query(
            serde_json::from_value(json!({"url": "http://x", "sequence": "world", "interval": "15"}))
                .unwrap(),
        )
        .await;

        let (snapshot, _) = m.scan().await;
        let q = snapshot.values().next().unwrap();
        assert_eq!(q.status, QueryStatus::ConnectionLost);
        assert_eq!(q.cycles, 0);

        // Immediately scan again without advancing the clock: still due.
        let (snapshot, _) = m.scan().await;
        let q = snapshot.values().next().unwrap();
        assert_eq!(q.status, QueryStatus::ConnectionLost);
    }

    #[tokio::test]
    async fn duplicate_alias_rejected_first_query_intact() {
        // spec.md §8 scenario 5.
        let clock = Arc::new(FrozenClock::new(utc_now()));
        let fetcher = Arc::new(FakeFetcher::new(vec![FetchOutcome {
            text: String::new(),
            status: QueryStatus::Ok,
        }]));
        let m = monitor(clock, fetcher);

        let (ok1, _) = m
            .add_query(
                serde_json::from_value(json!({
                    "url": "http://a", "sequence": "x", "interval": "15", "alias": "a"
                }))
                .unwrap(),
            )
            .await;
        assert!(ok1);

        let (ok2, msg2) = m
            .add_query(
                serde_json::from_value(json!({
                    "url": "http://b", "sequence": "x", "interval": "15", "alias": "a"
                }))
                .unwrap(),
            )
            .await;
        assert!(!ok2);
        assert!(msg2.contains("duplicate alias"));

        let snapshot = m.all_queries().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.values().next().unwrap().url, "http://a");
    }

    #[tokio::test]
    async fn restore_recurring_rearm() {
        // spec.md §8 scenario 6: save a recurring, matched query, then
        // populate a fresh Monitor from the persisted dashboard — the
        // restored query must come back re-armed (found=false).
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf(), "default.wav".to_string());
        let clock = Arc::new(FrozenClock::new(utc_now()));
        let fetcher: Arc<dyn Fetch> = Arc::new(FakeFetcher::new(vec![FetchOutcome {
            text: String::new(),
            status: QueryStatus::Ok,
        }]));

        let m1 = Monitor::new(
            "alice".to_string(),
            storage.clone(),
            fetcher.clone(),
            vec![],
            5,
            4,
            clock.clone(),
        );
        m1.restore_query(
            serde_json::from_value(json!({
                "uid": "u1", "url": "http://x", "sequence": "world", "interval": "15",
                "is_recurring": true, "found": true, "cycles": 3
            }))
            .unwrap(),
        )
        .await;
        let (ok, _) = m1.save().await;
        assert!(ok);

        let m2 = Monitor::new("alice".to_string(), storage, fetcher, vec![], 5, 4, clock);
        let (ok, _) = m2.populate().await;
        assert!(ok);

        let q = m2.get_query("u1").await.unwrap();
        assert!(!q.found);
        assert!(super::scheduler::should_run(&q, utc_now()));
    }

    fn utc_now() -> chrono::DateTime<chrono::Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }
}
