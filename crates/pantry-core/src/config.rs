use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::PantryError;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Top-level Pantry configuration, stored at `~/.pantry/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PantryConfig {
    /// Base URL of the storefront REST API.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Per-request timeout for API calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Key under which the session bearer token is kept in the OS keychain.
    #[serde(default = "default_credential_key")]
    pub credential_key: String,

    /// Undo an optimistic change when the server rejects it.
    #[serde(default = "default_true")]
    pub rollback_on_failure: bool,

    /// Send mutations for the same product one at a time, in issue order.
    #[serde(default = "default_true")]
    pub serialize_per_key: bool,
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_credential_key() -> String {
    "pantry:session".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PantryConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            credential_key: default_credential_key(),
            rollback_on_failure: true,
            serialize_per_key: true,
        }
    }
}

impl PantryConfig {
    /// Returns the Pantry home directory (`~/.pantry/`).
    pub fn home_dir() -> Result<PathBuf, PantryError> {
        let base = dirs::home_dir().ok_or_else(|| PantryError::Config {
            message: "could not determine home directory".into(),
        })?;
        Ok(base.join(".pantry"))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Result<PathBuf, PantryError> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or return defaults if not found.
    pub fn load() -> Result<Self, PantryError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, PantryError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| PantryError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<(), PantryError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), PantryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PantryError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Initialize the Pantry home directory with default config.
    pub fn init() -> Result<PathBuf, PantryError> {
        let home = Self::home_dir()?;
        std::fs::create_dir_all(&home)?;

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            Self::default().save_to(&config_path)?;
        }

        Ok(home)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<(), PantryError> {
        if self.api_url.cannot_be_a_base() {
            return Err(PantryError::Config {
                message: format!("api_url is not a base URL: {}", self.api_url),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(PantryError::Config {
                message: "request_timeout_secs must be greater than zero".into(),
            });
        }
        if self.credential_key.trim().is_empty() {
            return Err(PantryError::Config {
                message: "credential_key must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrip() {
        let config = PantryConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: PantryConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config.api_url, deserialized.api_url);
        assert_eq!(config.request_timeout_secs, deserialized.request_timeout_secs);
        assert!(deserialized.rollback_on_failure);
        assert!(deserialized.serialize_per_key);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"https://shop.example.com/api\"\n").unwrap();

        let config = PantryConfig::load_from(&path).unwrap();
        assert_eq!(config.api_url.as_str(), "https://shop.example.com/api");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.credential_key, "pantry:session");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "request_timeout_secs = 0\n").unwrap();

        let err = PantryConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, PantryError::Config { .. }));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = PantryConfig::default();
        config.rollback_on_failure = false;
        config.save_to(&path).unwrap();

        let loaded = PantryConfig::load_from(&path).unwrap();
        assert!(!loaded.rollback_on_failure);
    }
}
