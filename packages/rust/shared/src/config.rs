//! Application configuration for pricescrape.
//!
//! User config lives at `~/.pricescrape/pricescrape.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PriceScrapeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pricescrape.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pricescrape";

/// Override table written next to the config by `init_config`.
const OVERRIDES_FILE_NAME: &str = "url_overrides.toml";

/// The known URL overrides for the current catalog snapshot.
const DEFAULT_OVERRIDES: &str = include_str!("../../../../fixtures/url_overrides.toml");

/// Longest single backoff pause.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Upper bounds accepted by [`FetchConfig::validate`].
const MAX_BACKOFF_FACTOR: f64 = 60.0;
const MAX_RETRIES: u32 = 20;

// ---------------------------------------------------------------------------
// Config structs (matching pricescrape.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub store: StoreSection,

    /// HTTP retry policy.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Catalog input and scrape pacing.
    #[serde(default)]
    pub ingest: IngestSection,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// libSQL database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/pricescrape.db".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Retries after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Exponential backoff factor in seconds.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// HTTP statuses that trigger a retry.
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            backoff_factor: default_backoff_factor(),
            retry_statuses: default_retry_statuses(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_retries() -> u32 {
    4
}
fn default_backoff_factor() -> f64 {
    0.9
}
fn default_retry_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504, 429]
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("pricescrape/", env!("CARGO_PKG_VERSION")).into()
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSection {
    /// Price catalog CSV.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Optional TOML table of literal URL overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides_path: Option<String>,

    /// Pricing site path that `<console>/<slug>` is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Pause between items, in milliseconds.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            overrides_path: None,
            base_url: default_base_url(),
            item_delay_ms: default_item_delay_ms(),
        }
    }
}

fn default_catalog_path() -> String {
    "game_prices.csv".into()
}
fn default_base_url() -> String {
    "https://www.pricecharting.com/game/".into()
}
fn default_item_delay_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Store connection settings, passed to `Store::open`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl From<&AppConfig> for StoreConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            path: PathBuf::from(&config.store.path),
        }
    }
}

/// Retry policy and client settings for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub retries: u32,
    pub backoff_factor: f64,
    pub retry_statuses: Vec<u16>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            retries: config.fetch.retries,
            backoff_factor: config.fetch.backoff_factor,
            retry_statuses: config.fetch.retry_statuses.clone(),
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            user_agent: config.fetch.user_agent.clone(),
        }
    }
}

impl FetchConfig {
    /// Delay before retry number `retry` (1-based): `factor * 2^(retry-1)` seconds,
    /// capped at [`MAX_BACKOFF`].
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if retry == 0 || !(self.backoff_factor > 0.0) {
            return Duration::ZERO;
        }
        let exp = 2f64.powi(retry.saturating_sub(1).min(16) as i32);
        Duration::try_from_secs_f64(self.backoff_factor * exp)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Reject retry settings that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(PriceScrapeError::config(format!(
                "fetch.backoff_factor must be a finite, non-negative number, got {}",
                self.backoff_factor
            )));
        }
        if self.backoff_factor > MAX_BACKOFF_FACTOR {
            return Err(PriceScrapeError::config(format!(
                "fetch.backoff_factor must be at most {MAX_BACKOFF_FACTOR}, got {}",
                self.backoff_factor
            )));
        }
        if self.retries > MAX_RETRIES {
            return Err(PriceScrapeError::config(format!(
                "fetch.retries must be at most {MAX_RETRIES}, got {}",
                self.retries
            )));
        }
        if self.timeout.is_zero() {
            return Err(PriceScrapeError::config("fetch.timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// Everything the ingest pipeline needs besides the store and fetch settings.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub catalog_path: PathBuf,
    pub overrides_path: Option<PathBuf>,
    pub base_url: String,
    pub item_delay: Duration,
    /// Restrict the run to these consoles (empty = all).
    pub consoles: Vec<String>,
    /// Stop after this many items.
    pub limit: Option<usize>,
    /// Keep the existing store and replace only the history of scraped items.
    pub resume: bool,
}

impl From<&AppConfig> for IngestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            catalog_path: PathBuf::from(&config.ingest.catalog_path),
            overrides_path: config.ingest.overrides_path.as_ref().map(PathBuf::from),
            base_url: config.ingest.base_url.clone(),
            item_delay: Duration::from_millis(config.ingest.item_delay_ms),
            consoles: Vec::new(),
            limit: None,
            resume: false,
        }
    }
}

impl IngestConfig {
    /// Check the base URL is absolute http(s) and ends in `/`.
    pub fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.base_url).map_err(|e| {
            PriceScrapeError::config(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(PriceScrapeError::config(format!(
                "base_url must be http(s), got '{}'",
                self.base_url
            )));
        }
        if !self.base_url.ends_with('/') {
            return Err(PriceScrapeError::config(format!(
                "base_url must end with '/', got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pricescrape/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PriceScrapeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pricescrape/pricescrape.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PriceScrapeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PriceScrapeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_in(&config_dir()?)
}

/// Write a default config file into `dir`, together with the known URL
/// override table, which the config points at. An existing override file is
/// left untouched.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| PriceScrapeError::io(dir, e))?;

    let overrides = dir.join(OVERRIDES_FILE_NAME);
    if !overrides.exists() {
        std::fs::write(&overrides, DEFAULT_OVERRIDES)
            .map_err(|e| PriceScrapeError::io(&overrides, e))?;
        tracing::info!(path = ?overrides, "wrote default URL override table");
    }

    let path = dir.join(CONFIG_FILE_NAME);
    let mut config = AppConfig::default();
    config.ingest.overrides_path = Some(overrides.to_string_lossy().into_owned());
    let content =
        toml::to_string_pretty(&config).map_err(|e| PriceScrapeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PriceScrapeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
