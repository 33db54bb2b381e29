//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Locale;
use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetching behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Baseline storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Batch fan-out settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values read through `lookup`.
    ///
    /// Recognized keys: `QPS`, `USER_AGENT`, `STORAGE_PATH`, `LANG`, `DEBUG`,
    /// `BATCH_TIMEOUT_SECS`, `MAX_CONCURRENT`, `BASE_URL`. An empty
    /// `USER_AGENT` keeps the browser default.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(qps) = lookup("QPS") {
            self.fetch.qps = parse_env("QPS", &qps)?;
        }
        if let Some(ua) = lookup("USER_AGENT").filter(|ua| !ua.trim().is_empty()) {
            self.fetch.user_agent = ua;
        }
        if let Some(base_url) = lookup("BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.fetch.base_url = base_url;
        }
        if let Some(lang) = lookup("LANG") {
            self.fetch.locale = Locale::from_toggle(&lang);
        }
        if let Some(path) = lookup("STORAGE_PATH").filter(|p| !p.trim().is_empty()) {
            self.storage.root = PathBuf::from(path);
        }
        if let Some(timeout) = lookup("BATCH_TIMEOUT_SECS") {
            self.batch.timeout_secs = parse_env("BATCH_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(max) = lookup("MAX_CONCURRENT") {
            self.batch.max_concurrent = parse_env("MAX_CONCURRENT", &max)?;
        }
        if let Some(debug) = lookup("DEBUG") {
            self.logging.debug = debug.trim() == "true";
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.qps == 0 {
            return Err(AppError::validation("fetch.qps must be > 0"));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.fetch.base_url)?;
        if self.batch.timeout_secs == 0 {
            return Err(AppError::validation("batch.timeout_secs must be > 0"));
        }
        if self.batch.max_concurrent == 0 {
            return Err(AppError::validation("batch.max_concurrent must be > 0"));
        }
        if self.storage.root.as_os_str().is_empty() {
            return Err(AppError::validation("storage.root is empty"));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::config(format!("{key} has invalid value '{value}'")))
}

/// HTTP client and fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum requests per second across the whole batch
    #[serde(default = "defaults::qps")]
    pub qps: u32,

    /// User-Agent header; upstream rejects non-browser agents
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Site locale used to build page URLs
    #[serde(default)]
    pub locale: Locale,

    /// Scheme and host of the announcement site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            qps: defaults::qps(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            locale: Locale::default(),
            base_url: defaults::base_url(),
        }
    }
}

/// How baselines are stored and compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Keep the full previous body and emit text diffs
    #[default]
    Rich,
    /// Keep only a SHA-256 digest of the body
    Digest,
}

impl CompareMode {
    /// File suffix of baselines written in this mode.
    pub fn suffix(&self) -> &'static str {
        match self {
            CompareMode::Rich => ".html",
            CompareMode::Digest => ".sha256",
        }
    }
}

impl FromStr for CompareMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rich" => Ok(CompareMode::Rich),
            "digest" => Ok(CompareMode::Digest),
            other => Err(AppError::validation(format!("unknown compare mode '{other}'"))),
        }
    }
}

/// Baseline storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one baseline file per item
    #[serde(default = "defaults::storage_root")]
    pub root: PathBuf,

    /// Baseline strategy
    #[serde(default)]
    pub mode: CompareMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: defaults::storage_root(),
            mode: CompareMode::default(),
        }
    }
}

/// Batch fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Deadline for the whole batch in seconds
    #[serde(default = "defaults::batch_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on items processed at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl BatchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::batch_timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit debug-level logs
    #[serde(default)]
    pub debug: bool,
}

impl LoggingConfig {
    /// Default filter for the logger.
    pub fn level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn qps() -> u32 {
        5
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/58.0.3029.110 Safari/537.3"
            .into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn base_url() -> String {
        "https://www.robomaster.com".into()
    }
    pub fn storage_root() -> PathBuf {
        PathBuf::from("./")
    }
    pub fn batch_timeout() -> u64 {
        30 * 60
    }
    pub fn max_concurrent() -> usize {
        32
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn validate_default_config_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch.qps, 5);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.batch.timeout_secs, 1800);
        assert!(config.fetch.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn validate_rejects_zero_qps() {
        let mut config = Config::default();
        config.fetch.qps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.fetch.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overlay_applies_known_keys() {
        let mut config = Config::default();
        config
            .apply_env_with(lookup(&[
                ("QPS", "9"),
                ("USER_AGENT", "probe/1.0"),
                ("STORAGE_PATH", "/var/lib/announce"),
                ("LANG", "EN"),
                ("DEBUG", "true"),
                ("MAX_CONCURRENT", "4"),
            ]))
            .unwrap();

        assert_eq!(config.fetch.qps, 9);
        assert_eq!(config.fetch.user_agent, "probe/1.0");
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/announce"));
        assert_eq!(config.fetch.locale, Locale::En);
        assert!(config.logging.debug);
        assert_eq!(config.logging.level(), "debug");
        assert_eq!(config.batch.max_concurrent, 4);
    }

    #[test]
    fn env_overlay_keeps_default_user_agent_when_empty() {
        let mut config = Config::default();
        config
            .apply_env_with(lookup(&[("USER_AGENT", ""), ("LANG", "zh")]))
            .unwrap();
        assert!(config.fetch.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.fetch.locale, Locale::Zh);
    }

    #[test]
    fn env_overlay_rejects_garbage_numbers() {
        let mut config = Config::default();
        assert!(config.apply_env_with(lookup(&[("QPS", "fast")])).is_err());
    }

    #[test]
    fn toml_partial_sections_fill_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetch]
            qps = 2
            locale = "en"

            [storage]
            root = "baselines"
            mode = "digest"
            "#,
        )
        .unwrap();
        assert_eq!(config.fetch.qps, 2);
        assert_eq!(config.fetch.locale, Locale::En);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.storage.mode, CompareMode::Digest);
        assert_eq!(config.storage.mode.suffix(), ".sha256");
        assert_eq!(config.batch.max_concurrent, 32);
    }
}
