//! Configuration file parser for ~/.config/gator/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::DEFAULT_MAX_FEED_BYTES;

// ============================================================================
// Error Types
// ============================================================================

/// Startup configuration problems. All of these are fatal: the poll loop is
/// never started with an invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("Fetch timeout must be greater than zero")]
    InvalidTimeout,

    #[error("HOME environment variable not set")]
    NoHomeDir,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Defaults to `~/.config/gator/gator.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Account that `addfeed` assigns new sources to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user: Option<String>,

    /// Seconds between scheduler ticks.
    pub poll_interval_secs: u64,

    /// Upper bound on a single feed fetch, in seconds.
    pub fetch_timeout_secs: u64,

    /// Value of the User-Agent header on feed requests.
    pub user_agent: String,

    /// Largest feed body accepted, in bytes.
    pub max_feed_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            current_user: None,
            poll_interval_secs: 60,
            fetch_timeout_secs: 30,
            user_agent: concat!("gator/", env!("CARGO_PKG_VERSION")).to_string(),
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
        }
    }
}

const KNOWN_KEYS: [&str; 6] = [
    "database_path",
    "current_user",
    "poll_interval_secs",
    "fetch_timeout_secs",
    "user_agent",
    "max_feed_bytes",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// `~/.config/gator/`
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHomeDir)?;
        Ok(PathBuf::from(home).join(".config").join("gator"))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration back to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// `~/.config/gator/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_dir()?.join("config.toml"))
    }

    /// Configured database path, or `gator.db` in [`Config::default_dir`].
    ///
    /// HOME is only consulted when no path is configured.
    pub fn resolve_database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::default_dir()?.join("gator.db")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gator_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert!(config.user_agent.starts_with("gator/"));
        assert!(config.current_user.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/gator_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = scratch_dir("empty");
        let path = dir.join("config.toml");
        std::fs::write(&path, "  \n").unwrap();

        assert_eq!(Config::load(&path).unwrap(), Config::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = scratch_dir("partial");
        let path = dir.join("config.toml");
        std::fs::write(&path, "poll_interval_secs = 5\ncurrent_user = \"kahya\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.current_user.as_deref(), Some("kahya"));
        assert_eq!(config.fetch_timeout_secs, 30);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = scratch_dir("invalid");
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = scratch_dir("wrongtype");
        let path = dir.join("config.toml");
        std::fs::write(&path, "poll_interval_secs = \"soon\"\n").unwrap();

        assert!(Config::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = scratch_dir("too_large");
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_then_load_keeps_current_user() {
        let dir = scratch_dir("save");
        let path = dir.join("nested").join("config.toml");

        let config = Config {
            current_user: Some("lane".to_string()),
            ..Config::default()
        };
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_interval_is_invalid() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPollInterval)
        ));
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let config = Config {
            fetch_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_database_path_default_and_override() {
        if let Ok(dir) = Config::default_dir() {
            assert_eq!(
                Config::default().resolve_database_path().unwrap(),
                dir.join("gator.db")
            );
        }

        let config = Config {
            database_path: Some(PathBuf::from("/var/lib/gator.db")),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_database_path().unwrap(),
            PathBuf::from("/var/lib/gator.db")
        );
    }
}
