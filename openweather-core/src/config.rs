use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    cache::Strategy,
    model::{Language, Units},
};

/// Seconds a fresh response stays cached when the config does not say otherwise.
pub const DEFAULT_CACHE_SECONDS: u64 = 600;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// app_id = "..."
/// units = "metric"
/// language = "en"
/// cache_seconds = 600
/// cache = "persistent"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// OpenWeatherMap API key.
    pub app_id: Option<String>,

    /// "metric" or "imperial".
    pub units: Option<String>,

    /// "en" or "pt".
    pub language: Option<String>,

    pub cache_seconds: Option<u64>,

    /// "persistent" (default) or "ephemeral".
    pub cache: Option<String>,

    pub max_concurrency: Option<usize>,

    /// Override of the API base URL, mostly useful against a local mock.
    pub base_url: Option<String>,
}

impl Config {
    pub fn app_id(&self) -> Result<&str> {
        self.app_id
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeather app id configured.\n\
                     Hint: run `openweather configure` and enter your API key."
                )
            })
    }

    pub fn set_app_id(&mut self, app_id: String) {
        self.app_id = Some(app_id);
    }

    /// Configured units, falling back to metric when absent or unrecognized.
    pub fn default_units(&self) -> Units {
        Units::from_code(self.units.as_deref())
    }

    /// Configured language, falling back to English when absent or unrecognized.
    pub fn default_language(&self) -> Language {
        Language::from_code(self.language.as_deref())
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache_seconds.unwrap_or(DEFAULT_CACHE_SECONDS))
    }

    pub fn cache_strategy(&self) -> Result<Strategy> {
        match self.cache.as_deref() {
            None => Ok(Strategy::Persistent),
            Some(s) => s.parse(),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the durable response cache.
    pub fn cache_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.cache_dir().join("cache.json"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "openweather-client", "openweather")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
