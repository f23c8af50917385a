//! Configuration loading
//!
//! Bootstrap configuration comes from a single TOML file. Every field has a
//! compiled default, so a missing file (or a missing section) is never fatal.
//!
//! # Config file resolution
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable `SFL_CONFIG`
//! 3. `~/.config/sfl/config.toml` (platform config dir)
//! 4. `/etc/sfl/config.toml` (Linux only)
//! 5. Compiled defaults

use crate::dedup::IdentityKeyMode;
use crate::scoring::ScoringWeights;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SFL_CONFIG";

/// Upper bound of one fetch page
pub const MAX_PAGE_SIZE: u32 = 500;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite impressions database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub scoring: ScoringWeights,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub store_retry: StoreRetryConfig,

    #[serde(default)]
    pub backup: BackupConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Read API listener
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Days between "today" and the most recent complete day in the store
    ///
    /// Matches the batch job's `schedule.day_delay` in a normal deployment.
    #[serde(default = "default_day_delay")]
    pub day_offset: u32,
}

/// Upstream search source
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_endpoint")]
    pub endpoint: String,

    /// Records requested per fetch call (at most 500)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Fixed offset of the local timezone from UTC
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Pause between consecutive fetch calls
    #[serde(default = "default_fetch_pause_ms")]
    pub fetch_pause_ms: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub filters: SearchFilters,
}

/// Search query filters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchFilters {
    /// Country of the author's profile
    #[serde(default = "default_country")]
    pub country: Option<String>,

    #[serde(default = "default_lang")]
    pub lang: Option<String>,

    #[serde(default = "default_true")]
    pub exclude_retweets: bool,

    #[serde(default = "default_true")]
    pub exclude_replies: bool,

    #[serde(default)]
    pub verified_only: bool,

    #[serde(default)]
    pub unverified_only: bool,

    /// Exclude embedded images and videos
    #[serde(default = "default_true")]
    pub exclude_media: bool,

    #[serde(default)]
    pub exclude_links: bool,

    #[serde(default)]
    pub exclude_mentions: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            country: default_country(),
            lang: default_lang(),
            exclude_retweets: true,
            exclude_replies: true,
            verified_only: false,
            unverified_only: false,
            exclude_media: true,
            exclude_links: false,
            exclude_mentions: false,
        }
    }
}

impl SearchFilters {
    pub fn validate(&self) -> Result<()> {
        if self.verified_only && self.unverified_only {
            return Err(Error::InvalidInput(
                "verified_only and unverified_only are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the filters as a search query string
    pub fn to_query(&self) -> Result<String> {
        self.validate()?;

        let mut parts: Vec<String> = Vec::new();
        if let Some(country) = self.country.as_deref().filter(|c| !c.is_empty()) {
            parts.push(format!("profile_country:{}", country));
        }
        if let Some(lang) = self.lang.as_deref().filter(|l| !l.is_empty()) {
            parts.push(format!("lang:{}", lang));
        }
        if self.exclude_retweets {
            parts.push("-is:retweet".to_string());
        }
        if self.exclude_replies {
            parts.push("-is:reply".to_string());
        }
        if self.verified_only {
            parts.push("is:verified".to_string());
        }
        if self.unverified_only {
            parts.push("-is:verified".to_string());
        }
        if self.exclude_media {
            parts.push("-has:images -has:videos".to_string());
        }
        if self.exclude_links {
            parts.push("-has:media -has:links".to_string());
        }
        if self.exclude_mentions {
            parts.push("-has:mentions".to_string());
        }

        Ok(parts.join(" "))
    }
}

/// Batch sentiment classifier
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,

    /// Whole-batch timeout; classification of a full day takes long
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub identity_key: IdentityKeyMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Days between the run date and the ingested day
    #[serde(default = "default_day_delay")]
    pub day_delay: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreRetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Root directory; backups land in `<dir>/backup/`
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("sfl.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    5780
}

fn default_fetch_endpoint() -> String {
    "https://api.twitter.com/1.1/tweets/search/30day/production.json".to_string()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_utc_offset_minutes() -> i32 {
    60 // CET
}

fn default_fetch_pause_ms() -> u64 {
    200
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_country() -> Option<String> {
    Some("be".to_string())
}

fn default_lang() -> Option<String> {
    Some("nl".to_string())
}

fn default_true() -> bool {
    true
}

fn default_classifier_endpoint() -> String {
    "http://127.0.0.1:5790/classify".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    3600
}

fn default_day_delay() -> u32 {
    2
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_backup_dir() -> PathBuf {
    default_data_dir()
}

/// OS-dependent data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sfl"))
        .unwrap_or_else(|| PathBuf::from("./sfl_data"))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            day_offset: default_day_delay(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_fetch_endpoint(),
            page_size: default_page_size(),
            utc_offset_minutes: default_utc_offset_minutes(),
            fetch_pause_ms: default_fetch_pause_ms(),
            timeout_secs: default_fetch_timeout_secs(),
            filters: SearchFilters::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            timeout_secs: default_classifier_timeout_secs(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_delay: default_day_delay(),
        }
    }
}

impl Default for StoreRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            enabled: true,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
            fetch: FetchConfig::default(),
            classifier: ClassifierConfig::default(),
            scoring: ScoringWeights::default(),
            dedup: DedupConfig::default(),
            schedule: ScheduleConfig::default(),
            store_retry: StoreRetryConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Resolve, read and validate the configuration
    ///
    /// Falls back to compiled defaults (with a warning) when no config file
    /// can be found. A file that exists but does not parse is an error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config = match resolve_config_path(cli_path) {
            Some(path) => Self::from_file(&path)?,
            None => {
                warn!("No config file found, using compiled defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse one TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch.page_size == 0 || self.fetch.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "fetch.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.fetch.page_size
            )));
        }
        if self.schedule.day_delay == 0 {
            return Err(Error::Config(
                "schedule.day_delay must be at least 1 (the ingested day must be complete)".to_string(),
            ));
        }
        if self.store_retry.max_attempts == 0 {
            return Err(Error::Config("store_retry.max_attempts must be at least 1".to_string()));
        }
        self.fetch
            .filters
            .validate()
            .map_err(|e| Error::Config(format!("fetch.filters: {}", e)))?;
        self.scoring.validate()?;
        Ok(())
    }
}

/// Find the config file following the resolution order above
///
/// An explicitly named file (CLI or env) is returned even if it does not
/// exist, so that reading it reports the bad path instead of silently
/// falling back to defaults.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("sfl").join("config.toml")) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Priority 4: System-wide config
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/sfl/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.api.port, 5780);
        assert_eq!(config.fetch.page_size, 500);
        assert_eq!(config.fetch.utc_offset_minutes, 60);
        assert_eq!(config.classifier.timeout_secs, 3600);
        assert_eq!(config.schedule.day_delay, 2);
        assert_eq!(config.store_retry.max_attempts, 5);
        assert_eq!(config.dedup.identity_key, IdentityKeyMode::Structured);
        assert_eq!(config.scoring, ScoringWeights::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            database_path = "/tmp/sfl-test.db"

            [scoring]
            follower_log_weight = 0.5

            [dedup]
            identity_key = "legacy_concat"

            [fetch.filters]
            lang = "fr"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/sfl-test.db"));
        assert_eq!(config.scoring.follower_log_weight, 0.5);
        assert_eq!(config.scoring.favorite_weight, 0.1);
        assert_eq!(config.dedup.identity_key, IdentityKeyMode::LegacyConcat);
        assert_eq!(config.fetch.filters.lang.as_deref(), Some("fr"));
        assert_eq!(config.fetch.filters.country.as_deref(), Some("be"));
        assert!(config.fetch.filters.exclude_retweets);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TomlConfig::default();
        config.schedule.day_delay = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = TomlConfig::default();
        config.fetch.page_size = 501;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = TomlConfig::default();
        config.fetch.filters.verified_only = true;
        config.fetch.filters.unverified_only = true;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(TomlConfig::from_toml_str("database_path = ["), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_query() {
        assert_eq!(
            SearchFilters::default().to_query().unwrap(),
            "profile_country:be lang:nl -is:retweet -is:reply -has:images -has:videos"
        );
    }

    #[test]
    fn test_query_with_all_filters() {
        let filters = SearchFilters {
            country: None,
            lang: Some("nl".to_string()),
            exclude_retweets: false,
            exclude_replies: false,
            verified_only: true,
            unverified_only: false,
            exclude_media: false,
            exclude_links: true,
            exclude_mentions: true,
        };
        assert_eq!(
            filters.to_query().unwrap(),
            "lang:nl is:verified -has:media -has:links -has:mentions"
        );
    }

    #[test]
    fn test_conflicting_verification_filters() {
        let filters = SearchFilters {
            verified_only: true,
            unverified_only: true,
            ..SearchFilters::default()
        };
        assert!(matches!(filters.to_query(), Err(Error::InvalidInput(_))));
    }

    #[test]
    #[serial]
    fn test_cli_path_wins_over_env() {
        std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");
        let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
        std::env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));
    }

    #[test]
    #[serial]
    fn test_env_path_used_without_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = 6000").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = TomlConfig::load(None);
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(config.unwrap().api.port, 6000);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_error() {
        std::env::remove_var(CONFIG_ENV_VAR);
        let result = TomlConfig::load(Some(Path::new("/nonexistent/sfl/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
