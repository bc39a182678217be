//! Query data model — a single user-defined watch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::eta::Eta;

/// Last-run outcome. `NeverRan` is the value before the first scan;
/// it is never persisted as anything but the initial state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    NeverRan,
    Ok,
    AccessDenied,
    ConnectionLost,
}

impl QueryStatus {
    pub fn as_i32(self) -> i32 {
        match self {
            QueryStatus::NeverRan => -1,
            QueryStatus::Ok => 0,
            QueryStatus::AccessDenied => 1,
            QueryStatus::ConnectionLost => 2,
        }
    }

    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => QueryStatus::Ok,
            1 => QueryStatus::AccessDenied,
            2 => QueryStatus::ConnectionLost,
            _ => QueryStatus::NeverRan,
        }
    }
}

/// Match polarity: `exists` requires the pattern to be present,
/// `not_exists` requires it to be absent.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Exists,
    NotExists,
}

/// A single user-defined watch on a URL for a pattern.
///
/// Field semantics are exactly spec.md §3. `eta` holds both the raw
/// user string and its parsed calendar predicate; they travel together
/// so a round-trip through storage never has to re-parse on every scan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Query {
    pub uid: String,
    pub alias: String,
    pub url: String,
    pub target_url: String,
    pub sequence: String,
    pub mode: MatchMode,
    pub min_matches: u32,
    pub interval: i64,
    pub cooldown: i64,
    pub randomize: u8,
    pub eta: Eta,
    pub cycles_limit: i64,
    pub cycles: u64,
    pub is_recurring: bool,
    pub last_run: DateTime<Utc>,
    pub last_match_datetime: DateTime<Utc>,
    pub found: bool,
    pub status: QueryStatus,
    #[serde(default)]
    pub is_new: bool,
    pub cookies_filename: String,
    pub alert_sound: String,
}

impl Query {
    /// The instant used as "never happened yet" — spec.md's `DEFAULT_DATE`.
    pub fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    /// Project this query's validator-relevant fields back into a raw
    /// params map, for `edit_query`'s merge-over-existing-record step.
    pub fn to_params(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("url".into(), self.url.clone().into());
        map.insert("target_url".into(), self.target_url.clone().into());
        map.insert("sequence".into(), self.sequence.clone().into());
        map.insert(
            "mode".into(),
            match self.mode {
                MatchMode::Exists => "exists".into(),
                MatchMode::NotExists => "not-exists".into(),
            },
        );
        map.insert("min_matches".into(), self.min_matches.into());
        map.insert("interval".into(), self.interval.to_string().into());
        map.insert("cooldown".into(), self.cooldown.to_string().into());
        map.insert("randomize".into(), self.randomize.into());
        map.insert("alias".into(), self.alias.clone().into());
        map.insert("eta".into(), self.eta.raw.clone().into());
        map.insert("cycles_limit".into(), self.cycles_limit.into());
        map.insert("is_recurring".into(), self.is_recurring.into());
        map
    }
}
