//! Validator — normalizes and type-checks incoming query parameter
//! maps; applies defaults; accumulates non-fatal warnings.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::eta::{parse_eta, Eta};
use super::query::MatchMode;

/// Fields produced by a successful validation — everything `add_query`
/// / `edit_query` need to build or merge a [`super::query::Query`].
#[derive(Debug, Clone)]
pub struct ValidatedFields {
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
    pub is_recurring: bool,
}

/// Context the validator needs beyond the raw params: the configured
/// floor for `interval`, and the alias table of the owning Monitor
/// (keyed by alias, valued by uid) so duplicate-alias checks can
/// exclude the record being edited.
pub struct ValidateContext<'a> {
    pub min_interval_minutes: i64,
    pub existing_aliases: &'a HashMap<String, String>,
    /// uid of the query being edited, if any (excluded from the
    /// duplicate-alias check).
    pub exclude_uid: Option<&'a str>,
}

fn get_str(params: &Map<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn get_bool(params: &Map<String, Value>, key: &str, default: bool) -> bool {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

fn get_i64(params: &Map<String, Value>, key: &str, default: i64) -> i64 {
    params
        .get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .unwrap_or(default)
}

/// Parse an interval/cooldown value: integer minutes, or a suffixed
/// form (`h` = hours, `d` = days), converted to minutes.
///
/// `"6"` -> 6, `"2.8h"` -> 168, `"3.5d"` -> 5040, `"5bc"` -> error.
pub fn parse_interval(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("interval must not be blank".into());
    }
    let (number_part, multiplier) = if let Some(stripped) = raw.strip_suffix(['h', 'H']) {
        (stripped, 60.0)
    } else if let Some(stripped) = raw.strip_suffix(['d', 'D']) {
        (stripped, 60.0 * 24.0)
    } else {
        (raw, 1.0)
    };
    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| format!("cannot parse interval \"{raw}\""))?;
    Ok((value * multiplier).round() as i64)
}

/// Validate a raw params map into [`ValidatedFields`].
///
/// Unknown keys are dropped silently. Required fields (`url`,
/// `sequence`, `interval`) cause a hard `Err` if absent/blank/
/// uncoercible. Everything else falls back to a default and, where
/// the fallback diverges meaningfully from the input, pushes a
/// warning.
pub fn validate(
    params: &Map<String, Value>,
    ctx: &ValidateContext,
) -> Result<(ValidatedFields, Vec<String>), String> {
    let mut warnings = Vec::new();

    let url = get_str(params, "url")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "url is required".to_string())?;

    let sequence = get_str(params, "sequence")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "sequence is required".to_string())?;

    let interval_raw = get_str(params, "interval")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "interval is required".to_string())?;
    let mut interval = parse_interval(&interval_raw)?;
    if interval < ctx.min_interval_minutes {
        warnings.push(format!(
            "interval {interval} below minimum, raised to {}",
            ctx.min_interval_minutes
        ));
        interval = ctx.min_interval_minutes;
    }

    let cooldown = match get_str(params, "cooldown").filter(|s| !s.trim().is_empty()) {
        Some(raw) => match parse_interval(&raw) {
            Ok(v) => v,
            Err(e) => {
                warnings.push(format!("invalid cooldown \"{raw}\": {e}, defaulting to interval"));
                interval
            }
        },
        None => interval,
    };
    let cooldown = if cooldown < interval {
        warnings.push(format!("cooldown {cooldown} below interval, raised to {interval}"));
        interval
    } else {
        cooldown
    };

    let target_url = get_str(params, "target_url")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| url.clone());

    let alias = get_str(params, "alias")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| url.clone());
    if let Some(existing_uid) = ctx.existing_aliases.get(&alias) {
        let is_self = ctx.exclude_uid == Some(existing_uid.as_str());
        if !is_self {
            return Err(format!("duplicate alias \"{alias}\""));
        }
    }

    let mode = match get_str(params, "mode").as_deref() {
        Some("not-exists") | Some("not_exists") => MatchMode::NotExists,
        Some("exists") | None => MatchMode::Exists,
        Some(other) => {
            warnings.push(format!("unknown mode \"{other}\", defaulting to exists"));
            MatchMode::Exists
        }
    };

    let min_matches = get_i64(params, "min_matches", 1).max(1) as u32;

    let randomize = get_i64(params, "randomize", 0).clamp(0, 100) as u8;

    let cycles_limit = get_i64(params, "cycles_limit", 0);

    let is_recurring = get_bool(params, "is_recurring", false);

    let eta_raw = get_str(params, "eta").unwrap_or_default();
    let eta = parse_eta(&eta_raw, &mut warnings);

    Ok((
        ValidatedFields {
            alias,
            url,
            target_url,
            sequence,
            mode,
            min_matches,
            interval,
            cooldown,
            randomize,
            eta,
            cycles_limit,
            is_recurring,
        },
        warnings,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(aliases: &HashMap<String, String>) -> ValidateContext<'_> {
        ValidateContext {
            min_interval_minutes: 5,
            existing_aliases: aliases,
            exclude_uid: None,
        }
    }

    #[test]
    fn interval_boundary_forms() {
        assert_eq!(parse_interval("6").unwrap(), 6);
        assert_eq!(parse_interval("2.8h").unwrap(), 168);
        assert_eq!(parse_interval("3.5d").unwrap(), 5040);
        assert!(parse_interval("5bc").is_err());
    }

    #[test]
    fn missing_required_field_fails() {
        let aliases = HashMap::new();
        let params: Map<String, Value> = serde_json::from_value(json!({
            "sequence": "world",
            "interval": "15"
        }))
        .unwrap();
        let err = validate(&params, &ctx(&aliases)).unwrap_err();
        assert!(err.contains("url"));
    }

    #[test]
    fn low_interval_clamped_with_warning() {
        let aliases = HashMap::new();
        let params: Map<String, Value> = serde_json::from_value(json!({
            "url": "http://x",
            "sequence": "world",
            "interval": "0"
        }))
        .unwrap();
        let (fields, warnings) = validate(&params, &ctx(&aliases)).unwrap();
        assert_eq!(fields.interval, 5);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn cooldown_clamped_to_interval() {
        let aliases = HashMap::new();
        let params: Map<String, Value> = serde_json::from_value(json!({
            "url": "http://x",
            "sequence": "world",
            "interval": "30",
            "cooldown": "10"
        }))
        .unwrap();
        let (fields, warnings) = validate(&params, &ctx(&aliases)).unwrap();
        assert_eq!(fields.cooldown, 30);
        assert!(warnings.iter().any(|w| w.contains("cooldown")));
    }

    #[test]
    fn alias_defaults_to_url() {
        let aliases = HashMap::new();
        let params: Map<String, Value> = serde_json::from_value(json!({
            "url": "http://x",
            "sequence": "world",
            "interval": "15"
        }))
        .unwrap();
        let (fields, _) = validate(&params, &ctx(&aliases)).unwrap();
        assert_eq!(fields.alias, "http://x");
    }

    #[test]
    fn duplicate_alias_rejected() {
        let mut aliases = HashMap::new();
        aliases.insert("a".to_string(), "uid-1".to_string());
        let params: Map<String, Value> = serde_json::from_value(json!({
            "url": "http://x",
            "sequence": "world",
            "interval": "15",
            "alias": "a"
        }))
        .unwrap();
        let err = validate(&params, &ctx(&aliases)).unwrap_err();
        assert!(err.contains("duplicate alias"));
    }

    #[test]
    fn duplicate_alias_allowed_when_editing_self() {
        let mut aliases = HashMap::new();
        aliases.insert("a".to_string(), "uid-1".to_string());
        let params: Map<String, Value> = serde_json::from_value(json!({
            "url": "http://x",
            "sequence": "world",
            "interval": "15",
            "alias": "a"
        }))
        .unwrap();
        let context = ValidateContext {
            min_interval_minutes: 5,
            existing_aliases: &aliases,
            exclude_uid: Some("uid-1"),
        };
        let (fields, _) = validate(&params, &context).unwrap();
        assert_eq!(fields.alias, "a");
    }

    #[test]
    fn min_matches_clamped_to_at_least_one() {
        let aliases = HashMap::new();
        let params: Map<String, Value> = serde_json::from_value(json!({
            "url": "http://x",
            "sequence": "world",
            "interval": "15",
            "min_matches": 0
        }))
        .unwrap();
        let (fields, _) = validate(&params, &ctx(&aliases)).unwrap();
        assert_eq!(fields.min_matches, 1);
    }
}
