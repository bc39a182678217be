//! Per-sound-filename binary storage, with a default-sound fallback on
//! miss (grounded in the original `users.py::get_sound_file` behavior).

use std::path::{Path, PathBuf};

fn sounds_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sounds")
}

/// Return `(bytes, filename)` for `name`. On miss, falls back to
/// `default_sound` and returns its own filename instead.
pub fn get(data_dir: &Path, name: &str, default_sound: &str) -> vg_domain::Result<(Vec<u8>, String)> {
    let dir = sounds_dir(data_dir);
    let requested = dir.join(name);
    if requested.exists() {
        return Ok((std::fs::read(&requested)?, name.to_string()));
    }
    let fallback = dir.join(default_sound);
    let bytes = std::fs::read(&fallback)?;
    Ok((bytes, default_sound.to_string()))
}

pub fn save(data_dir: &Path, name: &str, bytes: &[u8]) -> vg_domain::Result<()> {
    let dir = sounds_dir(data_dir);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(name), bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_on_miss() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "default.wav", b"default-bytes").unwrap();
        let (bytes, name) = get(dir.path(), "missing.wav", "default.wav").unwrap();
        assert_eq!(bytes, b"default-bytes");
        assert_eq!(name, "default.wav");
    }

    #[test]
    fn returns_requested_when_present() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "default.wav", b"default-bytes").unwrap();
        save(dir.path(), "custom.wav", b"custom-bytes").unwrap();
        let (bytes, name) = get(dir.path(), "custom.wav", "default.wav").unwrap();
        assert_eq!(bytes, b"custom-bytes");
        assert_eq!(name, "custom.wav");
    }
}
