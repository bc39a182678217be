//! Local session persistence: base URL, username, and auth token.
//!
//! The token is tried first against the OS keychain (`keyring`).
//! Headless environments without a keychain daemon fall back to a JSON
//! file under `~/.vigil/session.json`, locked with `fs2` and (on Unix)
//! written with `0o600` permissions.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const KEYRING_SERVICE: &str = "vigil";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub base_url: String,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    sessions: HashMap<String, Session>,
}

fn session_path() -> anyhow::Result<PathBuf> {
    // VIGIL_HOME lets tests (and unusual deployments) redirect the
    // session store without touching the real home directory.
    if let Ok(dir) = std::env::var("VIGIL_HOME") {
        return Ok(PathBuf::from(dir).join("session.json"));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".vigil").join("session.json"))
}

fn load_file() -> anyhow::Result<SessionFile> {
    let path = session_path()?;
    if !path.exists() {
        return Ok(SessionFile::default());
    }
    let file = std::fs::File::open(&path)?;
    fs2::FileExt::lock_shared(&file)?;
    let raw = std::io::read_to_string(&file)?;
    fs2::FileExt::unlock(&file)?;
    Ok(serde_json::from_str(&raw).unwrap_or_default())
}

fn write_file(store: &SessionFile) -> anyhow::Result<()> {
    let path = session_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(store)?;

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        let mut writer = std::io::BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        use std::io::Write;
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        let mut writer = std::io::BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
    }

    Ok(())
}

/// Persist a session. Tries the OS keychain first; falls back to the
/// file-backed store on any keychain error (no Secret Service daemon,
/// headless CI, etc).
pub fn save(session: &Session) -> anyhow::Result<()> {
    if save_to_keychain(session).is_ok() {
        return Ok(());
    }
    let mut store = load_file().unwrap_or_default();
    store.sessions.insert(session.username.clone(), session.clone());
    write_file(&store)
}

/// Load a saved session for `username`, checking the keychain before the
/// file-backed fallback.
pub fn load(username: &str) -> Option<Session> {
    if let Some(session) = load_from_keychain(username) {
        return Some(session);
    }
    load_file().ok()?.sessions.get(username).cloned()
}

fn save_to_keychain(session: &Session) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &session.username)?;
    let payload = serde_json::to_string(session)?;
    entry.set_password(&payload)?;
    Ok(())
}

fn load_from_keychain(username: &str) -> Option<Session> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username).ok()?;
    let payload = entry.get_password().ok()?;
    serde_json::from_str(&payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_round_trip_survives_missing_keychain() {
        // Point the store at a scratch directory so this test never
        // touches the developer's real session file, and so keychain
        // lookups (if a daemon happens to be present) still fail over
        // to the file-backed path for this unique username.
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("VIGIL_HOME", dir.path());

        let session = Session {
            base_url: "http://127.0.0.1:4180".into(),
            username: "vigil-cli-test-user".into(),
            token: "deadbeef".into(),
        };
        save(&session).unwrap();
        let loaded = load(&session.username).expect("session should round-trip");
        assert_eq!(loaded.token, session.token);
        assert_eq!(loaded.base_url, session.base_url);

        std::env::remove_var("VIGIL_HOME");
    }
}
