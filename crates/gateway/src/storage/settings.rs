//! Per-user settings blob (grounded in the original `db_conn.py`
//! load/save_settings pair).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_sound")]
    pub default_sound: String,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_sound() -> String {
    "default.wav".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_sound: default_sound(),
            notifications_enabled: true,
            extra: serde_json::Map::new(),
        }
    }
}

fn settings_path(data_dir: &Path, username: &str) -> PathBuf {
    data_dir.join("settings").join(format!("{username}.json"))
}

pub fn load(data_dir: &Path, username: &str) -> vg_domain::Result<Settings> {
    let path = settings_path(data_dir, username);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let bytes = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn save(data_dir: &Path, username: &str, settings: &Settings) -> vg_domain::Result<()> {
    let path = settings_path(data_dir, username);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(settings)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load(dir.path(), "alice").unwrap();
        assert_eq!(settings.default_sound, "default.wav");
        assert!(settings.notifications_enabled);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.notifications_enabled = false;
        save(dir.path(), "alice", &settings).unwrap();
        let loaded = load(dir.path(), "alice").unwrap();
        assert!(!loaded.notifications_enabled);
    }
}
