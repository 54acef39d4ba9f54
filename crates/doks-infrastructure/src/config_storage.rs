//! Config file loading.
//!
//! Reads `config.toml`, fills missing sections with defaults, applies
//! `DOKS_*` environment overrides and validates the result.

use crate::paths::DoksPaths;
use anyhow::Context;
use doks_core::config::DoksConfig;
use doks_core::error::{DoksError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_API_URL: &str = "DOKS_API_URL";
pub const ENV_TOP_K: &str = "DOKS_TOP_K";
pub const ENV_MIN_SCORE: &str = "DOKS_MIN_SCORE";
pub const ENV_WORD_DELAY_MS: &str = "DOKS_WORD_DELAY_MS";

/// Handle on a `config.toml` file.
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Creates a new config storage handle.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the config file (usually a .toml file)
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Handle on `~/.config/doks/config.toml`.
    pub fn default_location() -> anyhow::Result<Self> {
        let path = DoksPaths::config_file().context("Failed to resolve doks config path")?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config file.
    ///
    /// A missing or empty file yields the defaults. The result is not yet
    /// validated; see [`ConfigStorage::load_with_env`].
    pub fn load(&self) -> Result<DoksConfig> {
        if !self.path.exists() {
            tracing::debug!(
                "[ConfigStorage] No config file at {:?}, using defaults",
                self.path
            );
            return Ok(DoksConfig::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            DoksError::io(format!(
                "Failed to read config file at {:?}: {}",
                self.path, e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(DoksConfig::default());
        }

        let config: DoksConfig = toml::from_str(&content).map_err(|e| {
            DoksError::config(format!("Failed to parse TOML from {:?}: {}", self.path, e))
        })?;
        tracing::debug!("[ConfigStorage] Loaded config from {:?}", self.path);
        Ok(config)
    }

    /// Loads the file, applies process environment overrides and validates.
    pub fn load_with_env(&self) -> Result<DoksConfig> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }
}

/// Applies `DOKS_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut DoksConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL) {
        config.api.base_url = url;
    }
    if let Some(raw) = lookup(ENV_TOP_K) {
        let top_k = raw
            .trim()
            .parse::<u32>()
            .map_err(|e| DoksError::config(format!("{}={:?}: {}", ENV_TOP_K, raw, e)))?;
        config.query.top_k = Some(top_k);
    }
    if let Some(raw) = lookup(ENV_MIN_SCORE) {
        let min_score = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| DoksError::config(format!("{}={:?}: {}", ENV_MIN_SCORE, raw, e)))?;
        config.query.min_score = Some(min_score);
    }
    if let Some(raw) = lookup(ENV_WORD_DELAY_MS) {
        config.query.word_delay_ms = raw
            .trim()
            .parse::<u64>()
            .map_err(|e| DoksError::config(format!("{}={:?}: {}", ENV_WORD_DELAY_MS, raw, e)))?;
    }
    Ok(())
}
