//! Configuration management for the persistent whitelist.
//!
//! Stores a flat key-value document in JSON format at
//! `~/.appquitter/config.json`. Every value is a list of strings; keys this
//! crate does not know about are preserved on save.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::attempt::TerminationTimings;
use crate::error::{Error, Result};
use crate::ports::KeyValueStore;

/// Key under which the persistent whitelist is stored.
pub const PERSISTENT_WHITELIST_KEY: &str = "persistentWhitelist";

/// Bundle identifier used for self-protection when none is configured.
pub const DEFAULT_SELF_BUNDLE_ID: &str = "com.appquitter.AppQuitter";

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub lists: BTreeMap<String, Vec<String>>,
}

/// Settings the engine is constructed with.
#[derive(Debug, Clone)]
pub struct QuitterConfig {
    /// Bundle identifier of the controlling application.
    pub self_bundle_id: String,

    /// Location of the config file. `None` means `~/.appquitter/config.json`.
    pub config_path: Option<PathBuf>,

    pub timings: TerminationTimings,
}

impl QuitterConfig {
    /// Reject settings the engine cannot run safely with.
    pub fn validate(&self) -> Result<()> {
        if self.self_bundle_id.trim().is_empty() {
            return Err(Error::Config("self bundle identifier must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for QuitterConfig {
    fn default() -> Self {
        Self {
            self_bundle_id: DEFAULT_SELF_BUNDLE_ID.to_string(),
            config_path: None,
            timings: TerminationTimings::default(),
        }
    }
}

/// Configuration store backed by a JSON file.
///
/// Handles reading and writing configuration to `~/.appquitter/config.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.appquitter/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_dir = home.join(".appquitter");
        let config_path = config_dir.join("config.json");

        Ok(Self { config_path })
    }

    /// Create a config store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.config_path.parent().map(|p| p.to_path_buf())
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        if content.trim().is_empty() {
            return Ok(Config::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &Config) -> Result<()> {
        if let Some(config_dir) = self.config_dir() {
            if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
                fs::create_dir_all(&config_dir).await.map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}

impl KeyValueStore for ConfigStore {
    async fn load_list(&self, key: &str) -> Result<Vec<String>> {
        let config = self.load().await?;
        Ok(config.lists.get(key).cloned().unwrap_or_default())
    }

    async fn save_list(&self, key: &str, values: &[String]) -> Result<()> {
        let mut config = self.load().await?;
        config.lists.insert(key.to_string(), values.to_vec());
        self.save(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        (ConfigStore::with_path(path), dir)
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _dir) = test_store().await;
        let config = store.load().await.unwrap();
        assert!(config.lists.is_empty());
        assert!(store.load_list(PERSISTENT_WHITELIST_KEY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_list() {
        let (store, _dir) = test_store().await;

        let values = vec!["com.apple.finder".to_string(), "com.example.app".to_string()];
        store.save_list(PERSISTENT_WHITELIST_KEY, &values).await.unwrap();

        let loaded = store.load_list(PERSISTENT_WHITELIST_KEY).await.unwrap();
        assert_eq!(loaded, values);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_other_keys_preserved() {
        let (store, _dir) = test_store().await;

        store
            .save_list("recentlyQuit", &["com.example.old".to_string()])
            .await
            .unwrap();
        store
            .save_list(PERSISTENT_WHITELIST_KEY, &["com.example.app".to_string()])
            .await
            .unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.lists.len(), 2);
        assert_eq!(config.lists["recentlyQuit"], vec!["com.example.old".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_json_error() {
        let (store, _dir) = test_store().await;
        tokio::fs::write(store.path(), "{not json").await.unwrap();

        let result = store.load().await;
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_unwritable_path_is_config_error() {
        let (store, _dir) = test_store().await;
        // A directory where the temp file should go makes the create fail.
        tokio::fs::create_dir(store.path().with_extension("json.tmp"))
            .await
            .unwrap();

        let result = store.save(&Config::default()).await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_blank_self_id_rejected() {
        let config = QuitterConfig {
            self_bundle_id: "  ".to_string(),
            ..QuitterConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(QuitterConfig::default().validate().is_ok());
    }
}
