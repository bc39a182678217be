//! CSV-like dashboard table: one row per query, persisted per user.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::query::{MatchMode, Query, QueryStatus};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One persisted row. Mirrors [`Query`] minus the transient `is_new`
/// flag and the compiled pattern (never persisted, recompiled from
/// `sequence` on load).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardRow {
    pub uid: String,
    pub alias: String,
    pub url: String,
    pub target_url: String,
    pub sequence: String,
    pub mode: String,
    pub min_matches: u32,
    pub interval: i64,
    pub cooldown: i64,
    pub randomize: u8,
    pub eta: String,
    pub cycles_limit: i64,
    pub cycles: u64,
    pub is_recurring: bool,
    pub last_run: String,
    pub last_match_datetime: String,
    pub found: bool,
    pub status: i32,
    pub cookies_filename: String,
    pub alert_sound: String,
}

fn format_ts(dt: DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(|_| Query::epoch())
}

impl DashboardRow {
    pub fn from_query(q: &Query) -> Self {
        // A recurring query always persists found=false so it re-arms
        // on process restart.
        let found = if q.is_recurring { false } else { q.found };
        Self {
            uid: q.uid.clone(),
            alias: q.alias.clone(),
            url: q.url.clone(),
            target_url: q.target_url.clone(),
            sequence: q.sequence.clone(),
            mode: match q.mode {
                MatchMode::Exists => "exists".to_string(),
                MatchMode::NotExists => "not-exists".to_string(),
            },
            min_matches: q.min_matches,
            interval: q.interval,
            cooldown: q.cooldown,
            randomize: q.randomize,
            eta: q.eta.raw.clone(),
            cycles_limit: q.cycles_limit,
            cycles: q.cycles,
            is_recurring: q.is_recurring,
            last_run: format_ts(q.last_run),
            last_match_datetime: format_ts(q.last_match_datetime),
            found,
            status: q.status.as_i32(),
            cookies_filename: q.cookies_filename.clone(),
            alert_sound: q.alert_sound.clone(),
        }
    }

    /// Convert back into the raw params map `restore_query` expects,
    /// plus the fields it needs to carry verbatim.
    pub fn into_params(self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("uid".into(), self.uid.into());
        map.insert("alias".into(), self.alias.into());
        map.insert("url".into(), self.url.into());
        map.insert("target_url".into(), self.target_url.into());
        map.insert("sequence".into(), self.sequence.into());
        map.insert("mode".into(), self.mode.into());
        map.insert("min_matches".into(), self.min_matches.into());
        map.insert("interval".into(), self.interval.to_string().into());
        map.insert("cooldown".into(), self.cooldown.to_string().into());
        map.insert("randomize".into(), self.randomize.into());
        map.insert("eta".into(), self.eta.into());
        map.insert("cycles_limit".into(), self.cycles_limit.into());
        map.insert("cycles".into(), self.cycles.into());
        map.insert("is_recurring".into(), self.is_recurring.into());
        map.insert("last_run".into(), parse_ts(&self.last_run).to_rfc3339().into());
        map.insert(
            "last_match_datetime".into(),
            parse_ts(&self.last_match_datetime).to_rfc3339().into(),
        );
        map.insert("found".into(), self.found.into());
        map.insert("status".into(), QueryStatus::from_i32(self.status).as_i32().into());
        map.insert("cookies_filename".into(), self.cookies_filename.into());
        map.insert("alert_sound".into(), self.alert_sound.into());
        map
    }
}

fn dashboard_path(data_dir: &Path, username: &str) -> PathBuf {
    data_dir.join("dashboards").join(format!("{username}.csv"))
}

pub fn load(data_dir: &Path, username: &str) -> vg_domain::Result<Vec<DashboardRow>> {
    let path = dashboard_path(data_dir, username);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(&path).map_err(|e| vg_domain::Error::Csv(e.to_string()))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: DashboardRow = record.map_err(|e| vg_domain::Error::Csv(e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn save(data_dir: &Path, username: &str, rows: &[DashboardRow]) -> vg_domain::Result<()> {
    let path = dashboard_path(data_dir, username);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(&path).map_err(|e| vg_domain::Error::Csv(e.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| vg_domain::Error::Csv(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::eta::Eta;

    fn sample_query() -> Query {
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
            cycles: 3,
            is_recurring: true,
            last_run: Utc::now(),
            last_match_datetime: Utc::now(),
            found: true,
            status: QueryStatus::Ok,
            is_new: false,
            cookies_filename: "cookies_x.json".into(),
            alert_sound: "default.wav".into(),
        }
    }

    #[test]
    fn recurring_queries_persist_found_false() {
        let q = sample_query();
        let row = DashboardRow::from_query(&q);
        assert!(!row.found);
    }

    #[test]
    fn non_recurring_queries_persist_actual_found() {
        let mut q = sample_query();
        q.is_recurring = false;
        let row = DashboardRow::from_query(&q);
        assert!(row.found);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let q = sample_query();
        let row = DashboardRow::from_query(&q);
        save(dir.path(), "alice", &[row]).unwrap();
        let loaded = load(dir.path(), "alice").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].uid, "u1");
        assert_eq!(loaded[0].alias, "a");
    }

    #[test]
    fn missing_dashboard_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(dir.path(), "nobody").unwrap();
        assert!(loaded.is_empty());
    }
}
