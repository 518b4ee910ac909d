//! On-disk configuration
//!
//! Stored as TOML in an XDG-compliant config directory
//! (`~/.config/skycast/config.toml` on Linux). A missing file yields the
//! defaults, so first runs work without a `configure` step as long as the
//! API key is supplied through the `SKYCAST_API_KEY` environment variable.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CACHE_TTL_MS;
use crate::limiter::MAX_CALLS_PER_WINDOW;

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "SKYCAST_API_KEY";

/// Errors from loading or saving the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a config directory (no home directory?)")]
    NoConfigDir,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level configuration stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenWeatherMap API key
    pub api_key: Option<String>,
    /// Base URL for weather and forecast endpoints
    pub api_base_url: Option<String>,
    /// Base URL for the geocoding endpoint
    pub geo_base_url: Option<String>,
    /// Cache freshness TTL in milliseconds
    pub cache_ttl_ms: i64,
    /// Network calls admitted per rate-limit window
    pub max_calls_per_window: u32,
    /// Auto-refresh interval in seconds for `watch` mode
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: None,
            geo_base_url: None,
            cache_ttl_ms: CACHE_TTL_MS,
            max_calls_per_window: MAX_CALLS_PER_WINDOW,
            refresh_interval_secs: 60,
        }
    }
}

impl Config {
    /// API key from the environment, falling back to the config file
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }

    fn config_file_path() -> Result<PathBuf, ConfigError> {
        let project_dirs = ProjectDirs::from("", "", "skycast").ok_or(ConfigError::NoConfigDir)?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Loads the config from disk, or the defaults if no file exists yet
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_file_path()?;
        Self::load_from(path)
    }

    /// Loads the config from an explicit path (tests)
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            // First run: no config file yet
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Saves the config to disk, creating parent directories as needed
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_file_path()?;
        self.save_to(path)
    }

    /// Saves the config to an explicit path (tests)
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
        }

        // A default-constructed Config always serializes
        let contents = toml::to_string_pretty(self).expect("config serialization cannot fail");
        fs::write(&path, contents).map_err(|source| ConfigError::Write { path, source })
    }
}
