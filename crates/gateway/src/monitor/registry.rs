//! MonitorRegistry — process-wide `{username -> session}` map
//! (spec.md §4.7).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use vg_domain::clock::Clock;

use crate::fetch::Fetch;
use crate::storage::Storage;

use super::aggregate::Monitor;

struct Session {
    monitor: Arc<Monitor>,
    token: String,
    last_active: DateTime<Utc>,
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time string equality: a length mismatch short-circuits
/// (token length is not secret), equal-length candidates are compared
/// via [`ConstantTimeEq`].
fn tokens_equal(candidate: &str, expected: &str) -> bool {
    if candidate.len() != expected.len() {
        return false;
    }
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// A process-wide map of authenticated sessions, one per username.
pub struct MonitorRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    storage_root: std::path::PathBuf,
    default_sound: String,
    fetcher: Arc<dyn Fetch>,
    captcha_keywords: RwLock<Vec<String>>,
    min_interval_minutes: i64,
    max_concurrent_fetches: u32,
    clock: Arc<dyn Clock>,
}

impl MonitorRegistry {
    pub fn new(
        storage_root: std::path::PathBuf,
        default_sound: String,
        fetcher: Arc<dyn Fetch>,
        captcha_keywords: Vec<String>,
        min_interval_minutes: i64,
        max_concurrent_fetches: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            storage_root,
            default_sound,
            fetcher,
            captcha_keywords: RwLock::new(captcha_keywords),
            min_interval_minutes,
            max_concurrent_fetches,
            clock,
        }
    }

    /// Log in `username`. If no session exists, a fresh Monitor is
    /// created, populated from storage, and a fresh token generated;
    /// otherwise the existing token is returned unchanged.
    pub async fn login(&self, username: &str) -> String {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get_mut(username) {
            existing.last_active = self.clock.now();
            return existing.token.clone();
        }

        let token = random_token();
        let storage = Storage::new(self.storage_root.clone(), self.default_sound.clone());
        let monitor = Arc::new(Monitor::new(
            username.to_string(),
            storage,
            self.fetcher.clone(),
            self.captcha_keywords.read().await.clone(),
            self.min_interval_minutes,
            self.max_concurrent_fetches,
            self.clock.clone(),
        ));
        monitor.populate().await;

        sessions.insert(
            username.to_string(),
            Session {
                monitor,
                token: token.clone(),
                last_active: self.clock.now(),
            },
        );
        token
    }

    /// `auth_user(username, token)`: true iff the session's token
    /// equals `token` (constant-time comparison); advances
    /// `last_active` on success.
    pub async fn auth_user(&self, username: &str, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(username) {
            Some(session) => {
                let ok = tokens_equal(token, &session.token);
                if ok {
                    session.last_active = self.clock.now();
                }
                ok
            }
            None => false,
        }
    }

    pub async fn monitor(&self, username: &str) -> Option<Arc<Monitor>> {
        self.sessions.read().await.get(username).map(|s| s.monitor.clone())
    }

    /// Config reload fans out to every Monitor's derived globals.
    pub async fn reload_config(&self, captcha_keywords: Vec<String>) {
        *self.captcha_keywords.write().await = captcha_keywords.clone();
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            session.monitor.reload_config(captcha_keywords.clone()).await;
        }
    }
}
