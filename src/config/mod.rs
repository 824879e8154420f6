use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::questionnaire::builder::{BuildOptions, DEFAULT_CHUNK_SIZE};
use crate::questionnaire::schema::DEFAULT_MAX_DEPTH;

/// Ingestion settings, stored as `config.toml` in the user config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory or `http(s)://` base URL holding `<stem>.json` documents
    pub source: String,
    pub framework: String,
    pub timeout_secs: u64,
    pub chunk_size: usize,
    pub max_schema_depth: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: "data".to_string(),
            framework: "GRI".to_string(),
            timeout_secs: 30,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_schema_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl IngestConfig {
    /// Load from the default location, falling back to defaults when no
    /// file exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: IngestConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("esg-questionnaire").join("config.toml"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            chunk_size: self.chunk_size.max(1),
            max_schema_depth: self.max_schema_depth,
        }
    }
}
