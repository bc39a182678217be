//! Storage collaborator: dashboard rows, cookie blobs, sound files, and
//! settings, all scoped per user under a configured data directory.

pub mod cookies;
pub mod dashboard;
pub mod settings;
pub mod sounds;

use std::collections::HashMap;
use std::path::PathBuf;

pub use dashboard::DashboardRow;
pub use settings::Settings;

/// A handle to the on-disk storage tree. Cheap to clone; all state
/// lives on disk, not in this struct.
#[derive(Clone)]
pub struct Storage {
    data_dir: PathBuf,
    default_sound: String,
}

impl Storage {
    pub fn new(data_dir: PathBuf, default_sound: String) -> Self {
        Self {
            data_dir,
            default_sound,
        }
    }

    pub fn load_dashboard(&self, username: &str) -> vg_domain::Result<Vec<DashboardRow>> {
        dashboard::load(&self.data_dir, username)
    }

    pub fn save_dashboard(&self, username: &str, rows: &[DashboardRow]) -> vg_domain::Result<()> {
        dashboard::save(&self.data_dir, username, rows)
    }

    pub fn derive_cookies_filename(&self, url: &str) -> String {
        cookies::derive_filename(&self.data_dir, url)
    }

    pub fn load_cookies(&self, filename: &str) -> vg_domain::Result<HashMap<String, String>> {
        cookies::load(&self.data_dir, filename)
    }

    pub fn save_cookies(&self, filename: &str, map: &HashMap<String, String>) -> vg_domain::Result<()> {
        cookies::save(&self.data_dir, filename, map)
    }

    pub fn get_sound(&self, name: &str) -> vg_domain::Result<(Vec<u8>, String)> {
        sounds::get(&self.data_dir, name, &self.default_sound)
    }

    pub fn save_sound(&self, name: &str, bytes: &[u8]) -> vg_domain::Result<()> {
        sounds::save(&self.data_dir, name, bytes)
    }

    pub fn load_settings(&self, username: &str) -> vg_domain::Result<Settings> {
        settings::load(&self.data_dir, username)
    }

    pub fn save_settings(&self, username: &str, s: &Settings) -> vg_domain::Result<()> {
        settings::save(&self.data_dir, username, s)
    }
}
