use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    /// Path to a PID file the server locks exclusively for its
    /// lifetime, enforcing the single-process-owns-all-Monitors
    /// non-goal at startup. `None` disables the check (e.g. under a
    /// supervisor that already guarantees single-instance).
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            rate_limit: None,
            pid_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

fn d_port() -> u16 {
    4180
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-user persistence: dashboard CSV, cookie JSON blobs, sound
/// files, settings JSON — all rooted under `data_dir/<username>/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: PathBuf,
    /// Sound file served when a query's `alert_sound` is missing on disk.
    #[serde(default = "d_default_sound")]
    pub default_sound: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: d_data_dir(),
            default_sound: d_default_sound(),
        }
    }
}

fn d_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn d_default_sound() -> String {
    "default.wav".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fetch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    /// Maximum response body size in bytes (0 = unlimited).
    #[serde(default = "d_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Maximum characters of normalized text retained per fetch.
    #[serde(default = "d_max_text_chars")]
    pub max_text_chars: usize,
    /// When true, every normalized fetch is also written to `dump_dir`.
    #[serde(default)]
    pub dump_enabled: bool,
    #[serde(default = "d_dump_dir")]
    pub dump_dir: PathBuf,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: d_timeout_ms(),
            user_agent: d_user_agent(),
            max_size_bytes: d_max_size_bytes(),
            max_text_chars: d_max_text_chars(),
            dump_enabled: false,
            dump_dir: d_dump_dir(),
        }
    }
}

fn d_timeout_ms() -> u64 {
    20_000
}
fn d_user_agent() -> String {
    "Vigil/1.0 (+web-change-monitor)".into()
}
fn d_max_size_bytes() -> u64 {
    5 * 1024 * 1024
}
fn d_max_text_chars() -> usize {
    500_000
}
fn d_dump_dir() -> PathBuf {
    PathBuf::from("./data/dumps")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Minimum allowed scan interval in minutes; intervals below this are clamped up.
    #[serde(default = "d_min_interval")]
    pub min_interval_minutes: i64,
    /// Bounded worker pool size for concurrent scan fetches.
    #[serde(default = "d_max_concurrency")]
    pub max_concurrent_fetches: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_interval_minutes: d_min_interval(),
            max_concurrent_fetches: d_max_concurrency(),
        }
    }
}

fn d_min_interval() -> i64 {
    5
}
fn d_max_concurrency() -> u32 {
    8
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CAPTCHA keyword set (access-denied detection)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default = "d_captcha_keywords")]
    pub keywords: Vec<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            keywords: d_captcha_keywords(),
        }
    }
}

fn d_captcha_keywords() -> Vec<String> {
    vec![
        "captcha".into(),
        "access denied".into(),
        "permission denied".into(),
        "verify you are human".into(),
        "are you a robot".into(),
        "unusual traffic".into(),
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the `/reload_config` passphrase.
    /// If unset, `/reload_config` is permanently rejected.
    #[serde(default = "d_reload_passphrase_env")]
    pub reload_passphrase_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            reload_passphrase_env: d_reload_passphrase_env(),
        }
    }
}

fn d_reload_passphrase_env() -> String {
    "VIGIL_RELOAD_PASSPHRASE".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        if self.limits.min_interval_minutes <= 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "limits.min_interval_minutes".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.limits.max_concurrent_fetches == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "limits.max_concurrent_fetches".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.captcha.keywords.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "captcha.keywords".into(),
                message: "no CAPTCHA keywords configured — access-denied detection disabled"
                    .into(),
            });
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for (i, kw) in self.captcha.keywords.iter().enumerate() {
            if kw.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("captcha.keywords[{i}]"),
                    message: "keyword must not be blank".into(),
                });
            } else if !seen.insert(kw.as_str()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("captcha.keywords[{i}]"),
                    message: format!("duplicate keyword \"{kw}\""),
                });
            }
        }

        if std::env::var(&self.admin.reload_passphrase_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "admin.reload_passphrase_env".into(),
                message: format!(
                    "environment variable \"{}\" is unset — /reload_config will always reject",
                    self.admin.reload_passphrase_env
                ),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_has_no_hard_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "server.port").unwrap().severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "server.cors.allowed_origins")
                .unwrap()
                .severity,
            ConfigSeverity::Warning
        );
    }

    #[test]
    fn rate_limit_zero_rps_is_error() {
        let mut cfg = Config::default();
        cfg.server.rate_limit = Some(RateLimitConfig {
            requests_per_second: 0,
            burst_size: 10,
        });
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "server.rate_limit.requests_per_second")
                .unwrap()
                .severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn min_interval_zero_is_error() {
        let mut cfg = Config::default();
        cfg.limits.min_interval_minutes = 0;
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "limits.min_interval_minutes")
                .unwrap()
                .severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn empty_captcha_keyword_is_error() {
        let mut cfg = Config::default();
        cfg.captcha.keywords = vec!["".into()];
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "captcha.keywords[0]").unwrap().severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn duplicate_captcha_keyword_is_warning() {
        let mut cfg = Config::default();
        cfg.captcha.keywords = vec!["captcha".into(), "captcha".into()];
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.message.contains("duplicate") && e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 4180);
        assert_eq!(cfg.limits.min_interval_minutes, 5);
        assert!(!cfg.captcha.keywords.is_empty());
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
