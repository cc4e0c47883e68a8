// Configuration management for persistent state

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::PathBuf;

use crate::helpers::atomic_write;
use crate::models::RecentConnection;
use crate::state::settings::{AppConfig, ConfigOverrides};

#[cfg(debug_assertions)]
const APP_NAME: &str = "docscope-dev";

#[cfg(not(debug_assertions))]
const APP_NAME: &str = "docscope";

/// Recent connections kept on disk.
pub const MAX_RECENT_CONNECTIONS: usize = 10;

/// Manages persistent configuration files
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, initializing the config directory if needed
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Self::with_config_dir(config_dir)
    }

    /// Use `config_dir` instead of the platform config directory.
    pub fn with_config_dir(config_dir: PathBuf) -> Result<Self> {
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }
        Ok(Self { config_dir })
    }

    /// Get the platform-specific config directory
    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME)).context("Could not determine config directory")
    }

    pub fn config_dir(&self) -> &std::path::Path {
        &self.config_dir
    }

    fn file_path(&self, filename: &str) -> PathBuf {
        self.config_dir.join(filename)
    }

    /// Load data from a JSON file
    fn load_json<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);

        if !path.exists() {
            return Ok(None);
        }

        let data =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", filename))?;

        let value: T = serde_json::from_str(&data)
            .with_context(|| format!("Failed to deserialize {}", filename))?;

        Ok(Some(value))
    }

    /// Save data to a JSON file (atomic via temp + rename).
    fn save_json<T: Serialize + ?Sized>(&self, filename: &str, data: &T) -> Result<()> {
        let path = self.file_path(filename);

        let json = serde_json::to_string_pretty(data)
            .with_context(|| format!("Failed to serialize {}", filename))?;

        atomic_write(&path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", filename))?;

        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    const CONFIG_FILE: &'static str = "config.json";

    /// Defaults, then `config.json`, then environment variables.
    ///
    /// A config file that fails to parse (including unknown keys) is logged and
    /// ignored; the remaining layers still apply.
    pub fn load_config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        match self.load_json::<ConfigOverrides>(Self::CONFIG_FILE) {
            Ok(Some(overrides)) => config.merge(overrides),
            Ok(None) => {}
            Err(err) => log::warn!("Failed to load config file: {err:#}"),
        }
        config.apply_env();
        config
    }

    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        self.save_json(Self::CONFIG_FILE, config)
    }

    // =========================================================================
    // Recent connections
    // =========================================================================

    const RECENT_CONNECTIONS_FILE: &'static str = "recent_connections.json";

    pub fn load_recent_connections(&self) -> Result<Vec<RecentConnection>> {
        Ok(self.load_json(Self::RECENT_CONNECTIONS_FILE)?.unwrap_or_default())
    }

    pub fn save_recent_connections(&self, connections: &[RecentConnection]) -> Result<()> {
        let kept = &connections[..connections.len().min(MAX_RECENT_CONNECTIONS)];
        self.save_json(Self::RECENT_CONNECTIONS_FILE, kept)
    }
}
