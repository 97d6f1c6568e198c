//! On-disk state kept between CLI runs: search history and city counts.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use forecast_core::{SessionHistory, SqliteCityCounts};

#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join("http_cache.json")
    }

    pub fn counts(&self) -> Result<SqliteCityCounts> {
        SqliteCityCounts::open(&self.dir.join("cities.sqlite"))
    }

    /// Saved history, or an empty one on first run.
    pub fn load_history(&self) -> Result<SessionHistory> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(SessionHistory::new());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse history file: {}", path.display()))
    }

    pub fn save_history(&self, history: &SessionHistory) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {}", self.dir.display()))?;

        let path = self.history_path();
        let json = serde_json::to_string_pretty(history).context("Failed to serialize history")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write history file: {}", path.display()))
    }
}
