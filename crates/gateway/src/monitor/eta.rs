//! ETA grammar — a small human-facing schedule language.
//!
//! `eta.raw` is a comma-separated list of clauses; each clause is one
//! of five shapes. Parsing never hard-fails: an invalid
//! clause is dropped and its message appended to `warnings`, the
//! remaining clauses still apply.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// The parsed calendar predicate, plus the verbatim user string.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Eta {
    pub raw: String,
    pub dow: Vec<u8>,
    pub time_span: Vec<((u8, u8), (u8, u8))>,
    pub date: Vec<(u8, u8, i32)>,
    #[serde(with = "date_span_serde")]
    pub date_span: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    pub dow_span: Vec<(u8, u8)>,
}

mod date_span_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        v: &[(DateTime<Utc>, DateTime<Utc>)],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        v.to_vec().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, D::Error> {
        Vec::<(DateTime<Utc>, DateTime<Utc>)>::deserialize(d)
    }
}

fn weekday_index(name: &str) -> Option<u8> {
    Some(match name.to_ascii_lowercase().as_str() {
        "monday" => 0,
        "tuesday" => 1,
        "wednesday" => 2,
        "thursday" => 3,
        "friday" => 4,
        "saturday" => 5,
        "sunday" => 6,
        _ => return None,
    })
}

fn parse_hhmm(s: &str) -> Option<(u8, u8)> {
    let s = s.trim();
    let (h, m) = match s.split_once(':') {
        Some((h, m)) => (h, m),
        None => (s, "0"),
    };
    let h: u8 = h.trim().parse().ok()?;
    let m: u8 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some((h, m))
}

fn parse_date(s: &str) -> Option<(u8, u8, i32)> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let d: u8 = parts[0].trim().parse().ok()?;
    let m: u8 = parts[1].trim().parse().ok()?;
    let y: i32 = parts[2].trim().parse().ok()?;
    NaiveDate::from_ymd_opt(y, m as u32, d as u32)?;
    Some((d, m, y))
}

fn date_to_midnight_utc(d: u8, m: u8, y: i32) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(y, m as u32, d as u32)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Split `a-b` on the first `-` not part of a `D/M/YYYY` token. Since
/// none of our tokens otherwise contain `-`, a plain `split_once('-')`
/// is sufficient.
fn split_span(s: &str) -> Option<(&str, &str)> {
    s.split_once('-')
}

enum Clause {
    Dow(u8),
    DowSpan(u8, u8),
    TimeSpan((u8, u8), (u8, u8)),
    Date(u8, u8, i32),
    DateSpan((u8, u8, i32), (u8, u8, i32)),
}

fn parse_clause(raw: &str) -> Result<Clause, String> {
    let clause = raw.trim();
    if clause.is_empty() {
        return Err("empty clause".into());
    }

    // Single weekday name.
    if let Some(idx) = weekday_index(clause) {
        return Ok(Clause::Dow(idx));
    }

    // Everything else has exactly one '-' span separator.
    if let Some((lhs, rhs)) = split_span(clause) {
        let lhs = lhs.trim();
        let rhs = rhs.trim();

        // dow-dow
        if let (Some(a), Some(b)) = (weekday_index(lhs), weekday_index(rhs)) {
            return Ok(Clause::DowSpan(a, b));
        }

        // date-date (contains '/')
        if lhs.contains('/') && rhs.contains('/') {
            if let (Some(a), Some(b)) = (parse_date(lhs), parse_date(rhs)) {
                return Ok(Clause::DateSpan(a, b));
            }
            return Err(format!("invalid date span: \"{clause}\""));
        }

        // time-time
        if let (Some(a), Some(b)) = (parse_hhmm(lhs), parse_hhmm(rhs)) {
            return Ok(Clause::TimeSpan(a, b));
        }

        return Err(format!("unrecognized clause: \"{clause}\""));
    }

    // Single date.
    if clause.contains('/') {
        if let Some(d) = parse_date(clause) {
            return Ok(Clause::Date(d.0, d.1, d.2));
        }
        return Err(format!("invalid date: \"{clause}\""));
    }

    Err(format!("unrecognized clause: \"{clause}\""))
}

/// Parse `eta.raw`-style text into an [`Eta`]. Invalid clauses are
/// dropped; their messages are appended to `warnings`.
pub fn parse_eta(raw: &str, warnings: &mut Vec<String>) -> Eta {
    let mut eta = Eta {
        raw: raw.to_string(),
        ..Default::default()
    };

    for piece in raw.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        match parse_clause(piece) {
            Ok(Clause::Dow(d)) => eta.dow.push(d),
            Ok(Clause::DowSpan(a, b)) => eta.dow_span.push((a, b)),
            Ok(Clause::TimeSpan(a, b)) => eta.time_span.push((a, b)),
            Ok(Clause::Date(d, m, y)) => eta.date.push((d, m, y)),
            Ok(Clause::DateSpan(a, b)) => {
                let (Some(lo), Some(hi)) = (
                    date_to_midnight_utc(a.0, a.1, a.2),
                    date_to_midnight_utc(b.0, b.1, b.2),
                ) else {
                    warnings.push(format!("invalid ETA rule: \"{piece}\""));
                    continue;
                };
                eta.date_span.push((lo, hi));
            }
            Err(msg) => warnings.push(format!("invalid ETA rule: {msg}")),
        }
    }

    eta
}

/// Evaluate the parsed predicate against `now`. Empty lists impose no
/// constraint; an eta with all lists empty matches always.
pub fn eta_matches(eta: &Eta, now: DateTime<Utc>) -> bool {
    let now_weekday = now.weekday().num_days_from_monday() as u8;
    let now_hm = (now.hour() as u8, now.minute() as u8);

    if !eta.dow.is_empty() && !eta.dow.iter().any(|d| *d == now_weekday) {
        return false;
    }
    if !eta.time_span.is_empty()
        && !eta
            .time_span
            .iter()
            .any(|(lo, hi)| *lo <= now_hm && now_hm <= *hi)
    {
        return false;
    }
    if !eta.date_span.is_empty()
        && !eta
            .date_span
            .iter()
            .any(|(lo, hi)| *lo <= now && now <= *hi + chrono::Duration::hours(24))
    {
        return false;
    }
    if !eta.dow_span.is_empty()
        && !eta
            .dow_span
            .iter()
            .any(|(lo, hi)| *lo <= now_weekday && now_weekday <= *hi)
    {
        return false;
    }
    if !eta.date.is_empty() {
        let today = (now.day() as u8, now.month() as u8, now.year());
        if !eta.date.iter().any(|d| *d == today) {
            return false;
        }
    }

    true
}
