//! MatchEngine — compiles a query's pattern string into a regex
//! conjunction and evaluates it against normalized page text.

use regex::Regex;

use super::query::MatchMode;

/// Delimiter joining sub-patterns with AND semantics.
pub const AND_DELIMITER: &str = r"\&";

/// A compiled conjunction of sub-patterns.
pub struct MatchEngine {
    patterns: Vec<Regex>,
}

impl MatchEngine {
    /// Compile `sequence` (one or more sub-patterns joined by `\&`).
    pub fn compile(sequence: &str) -> Result<Self, String> {
        let mut patterns = Vec::new();
        for sub in sequence.split(AND_DELIMITER) {
            let sub = sub.trim();
            if sub.is_empty() {
                return Err("empty sub-pattern in sequence".into());
            }
            let re = Regex::new(&sub.to_lowercase())
                .map_err(|e| format!("invalid pattern \"{sub}\": {e}"))?;
            patterns.push(re);
        }
        if patterns.is_empty() {
            return Err("sequence must contain at least one sub-pattern".into());
        }
        Ok(Self { patterns })
    }

    /// Evaluate against already-normalized (will be lower-cased here)
    /// page text. Returns `(found, total_hits)`.
    pub fn evaluate(&self, text: &str, mode: MatchMode, min_matches: u32) -> (bool, u32) {
        let lower = text.to_lowercase();
        let total: u32 = self
            .patterns
            .iter()
            .map(|re| re.find_iter(&lower).count() as u32)
            .sum();
        let raw_match = total >= min_matches;
        let found = raw_match == matches!(mode, MatchMode::Exists);
        (found, total)
    }

    /// CAPTCHA/access-denied detection: case-insensitive substring scan,
    /// only consulted when `total == 0`.
    pub fn looks_access_denied(text: &str, keywords: &[String]) -> bool {
        let lower = text.to_lowercase();
        keywords
            .iter()
            .any(|kw| !kw.is_empty() && lower.contains(&kw.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pattern_exists_mode() {
        let engine = MatchEngine::compile("world").unwrap();
        let (found, hits) = engine.evaluate("Hello World, world peace", MatchMode::Exists, 1);
        assert!(found);
        assert_eq!(hits, 2);
    }

    #[test]
    fn min_matches_threshold() {
        let engine = MatchEngine::compile("world").unwrap();
        let (found, hits) = engine.evaluate("one world", MatchMode::Exists, 2);
        assert!(!found);
        assert_eq!(hits, 1);
    }

    #[test]
    fn not_exists_inverts_polarity() {
        let engine = MatchEngine::compile("missing-term").unwrap();
        let (found, hits) = engine.evaluate("nothing here", MatchMode::NotExists, 1);
        assert!(found);
        assert_eq!(hits, 0);
    }

    #[test]
    fn and_conjunction_requires_all_subpatterns() {
        let engine = MatchEngine::compile(r#"foo\&bar"#).unwrap();
        let (found, hits) = engine.evaluate("foo appears but bar does not", MatchMode::Exists, 1);
        assert!(found);
        assert_eq!(hits, 2);

        let engine2 = MatchEngine::compile(r#"foo\&zzz"#).unwrap();
        let (_, hits2) = engine2.evaluate("foo appears but zzz does not appear", MatchMode::Exists, 1);
        assert_eq!(hits2, 2);
    }

    #[test]
    fn invalid_regex_rejected() {
        assert!(MatchEngine::compile("(unclosed").is_err());
    }

    #[test]
    fn captcha_keyword_detection_is_case_insensitive() {
        let keywords = vec!["permission denied".to_string()];
        assert!(MatchEngine::looks_access_denied(
            "Sorry, PERMISSION DENIED for this resource",
            &keywords
        ));
        assert!(!MatchEngine::looks_access_denied("all clear", &keywords));
    }
}
