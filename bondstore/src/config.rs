//! Host configuration - lives in BONDSTORE_HOME/config.json

use std::path::{Path, PathBuf};

use log::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no home directory, set BONDSTORE_HOME")]
    NoHome,
    #[error("config i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Keystore document, relative to the home directory
    #[serde(default = "default_store_file")]
    pub store_file: String,
    /// Flat secrets document, relative to the home directory
    #[serde(default = "default_secrets_file")]
    pub secrets_file: String,
    /// Pending save requests held before new ones are dropped
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_store_file() -> String {
    "bonds.json".to_string()
}

fn default_secrets_file() -> String {
    "secrets.json".to_string()
}

fn default_queue_depth() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
            secrets_file: default_secrets_file(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Config {
    /// Load `config.json` from `home`, writing the defaults if it is missing
    pub fn load_or_create(home: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(home)?;
        let path = home.join("config.json");

        if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            let config = Self::default();
            std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;
            info!("Wrote default config to {}", path.display());
            Ok(config)
        }
    }

    pub fn store_path(&self, home: &Path) -> PathBuf {
        home.join(&self.store_file)
    }

    pub fn secrets_path(&self, home: &Path) -> PathBuf {
        home.join(&self.secrets_file)
    }
}

/// BONDSTORE_HOME, or ~/.bondstore
pub fn bondstore_home() -> Result<PathBuf, ConfigError> {
    match std::env::var_os("BONDSTORE_HOME") {
        Some(home) => Ok(PathBuf::from(home)),
        None => dirs::home_dir()
            .map(|h| h.join(".bondstore"))
            .ok_or(ConfigError::NoHome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");

        let config = Config::load_or_create(&home).unwrap();
        assert_eq!(config, Config::default());
        assert!(home.join("config.json").exists());
        assert_eq!(config.store_path(&home), home.join("bonds.json"));
        assert_eq!(config.secrets_path(&home), home.join("secrets.json"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"queue_depth": 2}"#).unwrap();

        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config.queue_depth, 2);
        assert_eq!(config.store_file, "bonds.json");
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "queue_depth = 2").unwrap();
        assert!(matches!(Config::load_or_create(dir.path()), Err(ConfigError::Parse(_))));
    }
}
