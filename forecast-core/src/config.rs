use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::http::{cache::DEFAULT_EXPIRE_AFTER, retry};

pub const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const OPEN_METEO_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_FORECAST_DAYS: u32 = 7;

/// HTTP response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON file backing the cache; in-memory only when unset.
    pub path: Option<PathBuf>,
    pub expire_after_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: None, expire_after_secs: DEFAULT_EXPIRE_AFTER.as_secs() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { retries: retry::DEFAULT_RETRIES, backoff_factor: retry::DEFAULT_BACKOFF_FACTOR }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// forecast_days = 5
///
/// [cache]
/// path = "/home/me/.cache/forecast/http.json"
/// expire_after_secs = 1800
///
/// [retry]
/// retries = 3
/// backoff_factor = 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub forecast_url: String,
    pub geodata_url: String,
    pub reverse_geocode_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub forecast_days: u32,
    /// Where the CLI keeps search history and city counts.
    pub data_dir: Option<PathBuf>,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forecast_url: OPEN_METEO_FORECAST_URL.into(),
            geodata_url: OPEN_METEO_GEOCODING_URL.into(),
            reverse_geocode_url: NOMINATIM_REVERSE_URL.into(),
            user_agent: concat!("forecast/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 10,
            forecast_days: DEFAULT_FORECAST_DAYS,
            data_dir: None,
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// `data_dir` if set, otherwise the platform data directory.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "forecast", "forecast-cli")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
