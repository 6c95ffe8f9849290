//! Configuration management for Gantry

pub mod schema;

pub use schema::{CacheConfig, Config, RemoteConfig};

use crate::error::{GantryError, GantryResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gantry")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gantry")
    }

    /// Base directory under which per-tenant cache roots live
    pub fn cache_base_dir() -> PathBuf {
        Self::state_dir().join("cache")
    }

    /// Load configuration, using defaults if no file exists
    pub async fn load(&self) -> GantryResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> GantryResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| GantryError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| GantryError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> GantryResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            GantryError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> GantryResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GantryError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs() -> GantryResult<()> {
        let dirs = [Self::state_dir(), Self::cache_base_dir()];

        for dir in &dirs {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| GantryError::io(format!("creating directory {}", dir.display()), e))?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.cache.max_total_mb, 1024);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.remote.base_url = Some("https://jobs.example.com".to_string());
        config.cache.max_total_mb = 64;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(
            loaded.remote.base_url.as_deref(),
            Some("https://jobs.example.com")
        );
        assert_eq!(loaded.cache.max_total_mb, 64);
    }

    #[tokio::test]
    async fn invalid_toml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "not [valid toml").await.unwrap();

        let manager = ConfigManager::with_path(path);
        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, GantryError::ConfigInvalid { .. }));
    }
}
