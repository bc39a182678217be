//! Per-cookies-filename JSON blob storage, plus the filename derivation
//! scheme resolved in SPEC_FULL.md's open questions: a hostname-derived
//! stem with a content-addressed hash suffix.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

fn cookies_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("cookies")
}

/// Derive a filesystem-safe cookie filename from `url`: a host-derived
/// stem plus a content-addressed hash suffix over the full URL.
/// Deterministic by construction (the same URL always derives the
/// same filename, so re-adding a query for an already-watched URL
/// reuses its existing cookie jar instead of minting a new one);
/// different URLs on the same host get distinct files without a
/// directory scan, since the four-byte digest prefix makes an
/// accidental collision between unrelated URLs negligible.
pub fn derive_filename(_data_dir: &Path, url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default();
    let stripped = host.strip_prefix("www.").unwrap_or(&host);
    let mut stem: String = stripped
        .chars()
        .map(|c| if c == '.' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if stem.is_empty() {
        stem = "cookies".to_string();
    }

    let digest = Sha256::digest(url.as_bytes());
    format!("{stem}_{}.json", hex::encode(&digest[..4]))
}

pub fn load(data_dir: &Path, filename: &str) -> vg_domain::Result<HashMap<String, String>> {
    let path = cookies_dir(data_dir).join(filename);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let bytes = std::fs::read(&path)?;
    let map: HashMap<String, String> = serde_json::from_slice(&bytes)?;
    Ok(map)
}

pub fn save(data_dir: &Path, filename: &str, map: &HashMap<String, String>) -> vg_domain::Result<()> {
    let dir = cookies_dir(data_dir);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(filename);
    let bytes = serde_json::to_vec_pretty(map)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Render a cookie map as a single `Cookie` header value.
pub fn to_header_value(map: &HashMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_prefix_and_hashes_full_url() {
        let dir = tempfile::tempdir().unwrap();
        let name = derive_filename(dir.path(), "https://www.example.com/page");
        assert_eq!(name, "example_com_bc04e972.json");
    }

    #[test]
    fn same_host_different_paths_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = derive_filename(dir.path(), "https://example.com/page");
        let b = derive_filename(dir.path(), "https://example.com/other");
        assert_ne!(a, b);
        assert!(a.starts_with("example_com_"));
        assert!(b.starts_with("example_com_"));
    }

    #[test]
    fn same_url_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let a = derive_filename(dir.path(), "https://example.com/watch");
        let b = derive_filename(dir.path(), "https://example.com/watch");
        assert_eq!(a, b);
    }

    #[test]
    fn falls_back_to_cookies_stem_on_unparsable_url() {
        let dir = tempfile::tempdir().unwrap();
        let name = derive_filename(dir.path(), "not a url");
        assert!(name.starts_with("cookies_"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = HashMap::new();
        map.insert("session".to_string(), "abc123".to_string());
        save(dir.path(), "example_com.json", &map).unwrap();
        let loaded = load(dir.path(), "example_com.json").unwrap();
        assert_eq!(loaded.get("session"), Some(&"abc123".to_string()));
    }

    #[test]
    fn header_value_joins_pairs() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "1".to_string());
        let header = to_header_value(&map);
        assert_eq!(header, "a=1");
    }
}
