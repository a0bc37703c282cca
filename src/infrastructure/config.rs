//! Application configuration: serde-backed config tree with a JSON file
//! manager (load-or-create-default, tolerant of corrupt files).

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

/// Default values for every tunable.
pub mod defaults {
    /// Per-strategy deadline inside one fan-out, seconds.
    pub const PER_STRATEGY_TIMEOUT_SECS: u64 = 20;

    /// Overall fan-out deadline, seconds.
    pub const OVERALL_TIMEOUT_SECS: u64 = 30;

    /// Bounded worker pool size — one worker per strategy.
    pub const WORKER_COUNT: usize = 5;

    /// Attempts per row before giving up.
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Fixed delay between row attempts, seconds.
    pub const RETRY_DELAY_SECS: u64 = 2;

    /// Wall-clock budget for a single row attempt, seconds.
    pub const ATTEMPT_BUDGET_SECS: u64 = 180;

    /// Hard ceiling on cumulative time for one row, seconds.
    pub const ROW_CEILING_SECS: u64 = 240;

    /// Rows processed concurrently (output order is always input order).
    pub const MAX_CONCURRENT_ROWS: usize = 1;

    /// Redirect resolution timeout, seconds.
    pub const REDIRECT_TIMEOUT_SECS: u64 = 10;

    /// Page-content fetch timeout, seconds.
    pub const CONTENT_TIMEOUT_SECS: u64 = 15;

    /// Geocoding API call timeout, seconds.
    pub const GEOCODING_TIMEOUT_SECS: u64 = 10;

    /// Browser page-load timeout, seconds.
    pub const PAGE_LOAD_TIMEOUT_SECS: u64 = 15;

    /// Browser script-execution timeout, seconds.
    pub const SCRIPT_TIMEOUT_SECS: u64 = 10;

    /// Wait after navigation for client-side redirects, seconds.
    pub const SETTLE_DELAY_SECS: u64 = 5;

    /// HTTP client-wide timeout, seconds.
    pub const HTTP_TIMEOUT_SECS: u64 = 15;

    pub const LOG_LEVEL: &str = "info";

    /// Hosts treated as short links / regional mirrors worth resolving.
    pub const SHORT_LINK_HOSTS: &[&str] =
        &["goo.gl", "maps.app.goo.gl", "google.co.za", "google.com.au"];
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extraction: ExtractionConfig,
    pub http: HttpConfig,
    pub geocoding: GeocodingConfig,
    pub browser: BrowserConfig,
    pub logging: LoggingConfig,
}

/// Orchestration and retry tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub per_strategy_timeout_secs: u64,
    pub overall_timeout_secs: u64,
    pub worker_count: usize,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub attempt_budget_secs: u64,
    pub row_ceiling_secs: u64,
    pub max_concurrent_rows: usize,
    pub redirect_timeout_secs: u64,
    pub content_timeout_secs: u64,
    pub short_link_hosts: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            per_strategy_timeout_secs: defaults::PER_STRATEGY_TIMEOUT_SECS,
            overall_timeout_secs: defaults::OVERALL_TIMEOUT_SECS,
            worker_count: defaults::WORKER_COUNT,
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_delay_secs: defaults::RETRY_DELAY_SECS,
            attempt_budget_secs: defaults::ATTEMPT_BUDGET_SECS,
            row_ceiling_secs: defaults::ROW_CEILING_SECS,
            max_concurrent_rows: defaults::MAX_CONCURRENT_ROWS,
            redirect_timeout_secs: defaults::REDIRECT_TIMEOUT_SECS,
            content_timeout_secs: defaults::CONTENT_TIMEOUT_SECS,
            short_link_hosts: defaults::SHORT_LINK_HOSTS
                .iter()
                .map(|host| host.to_string())
                .collect(),
        }
    }
}

/// HTTP transport settings shared by the network strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout_seconds: defaults::HTTP_TIMEOUT_SECS,
            follow_redirects: true,
        }
    }
}

/// Geocoding collaborator settings. The strategy degrades to absent when
/// no API key can be resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// API key; falls back to the GOOGLE_MAPS_API_KEY environment variable.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://maps.googleapis.com/maps/api/place/textsearch/json".to_string(),
            timeout_secs: defaults::GEOCODING_TIMEOUT_SECS,
        }
    }
}

impl GeocodingConfig {
    /// Key from config, else from the environment. Empty strings count
    /// as unconfigured.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_MAPS_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub enabled: bool,
    pub page_load_timeout_secs: u64,
    pub script_timeout_secs: u64,
    pub settle_delay_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_load_timeout_secs: defaults::PAGE_LOAD_TIMEOUT_SECS,
            script_timeout_secs: defaults::SCRIPT_TIMEOUT_SECS,
            settle_delay_secs: defaults::SETTLE_DELAY_SECS,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    /// Module-specific level overrides, e.g. "hyper": "warn".
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: true,
            file_output: false,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("headless_chrome".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Loads and persists the JSON config file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            config_path: path.unwrap_or_else(|| PathBuf::from("mapcoords.json")),
        }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load the config file, creating it with defaults when missing. A
    /// file that fails to parse is left in place and defaults are used,
    /// so a typo never blocks a batch run.
    pub async fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            let config = AppConfig::default();
            self.save(&config).await?;
            info!(path = %self.config_path.display(), "created default config file");
            return Ok(config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", self.config_path.display()))?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!(
                    path = %self.config_path.display(),
                    error = %err,
                    "config file is invalid, falling back to defaults"
                );
                Ok(AppConfig::default())
            }
        }
    }

    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
            }
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("Failed to write config file {}", self.config_path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_budgets() {
        let config = AppConfig::default();
        assert_eq!(config.extraction.max_attempts, 3);
        assert_eq!(config.extraction.attempt_budget_secs, 180);
        assert_eq!(config.extraction.row_ceiling_secs, 240);
        assert_eq!(config.extraction.worker_count, 5);
        assert!(config.browser.enabled);
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"extraction": {"max_attempts": 5}}"#).unwrap();
        assert_eq!(config.extraction.max_attempts, 5);
        assert_eq!(
            config.extraction.attempt_budget_secs,
            defaults::ATTEMPT_BUDGET_SECS
        );
        assert_eq!(config.http.timeout_seconds, defaults::HTTP_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn load_creates_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapcoords.json");
        let manager = ConfigManager::new(Some(path.clone()));

        let config = manager.load().await.unwrap();
        assert!(path.exists());
        assert_eq!(config.extraction.max_attempts, 3);

        // Second load reads the file it just wrote.
        let reloaded = manager.load().await.unwrap();
        assert_eq!(reloaded.extraction.row_ceiling_secs, 240);
    }

    #[tokio::test]
    async fn corrupt_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapcoords.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let manager = ConfigManager::new(Some(path));
        let config = manager.load().await.unwrap();
        assert_eq!(config.extraction.max_attempts, 3);
    }
}
