//! Configuration for credential-cache.

use crate::event::DEFAULT_EVENT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for cache data.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Credential log file name, relative to `root_dir` unless absolute.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Fail startup on a corrupt log instead of starting empty.
    #[serde(default)]
    pub strict_load: bool,

    /// Number of recent requests kept in the request history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            log_file: default_log_file(),
            strict_load: false,
            history_capacity: default_history_capacity(),
            event_channel_capacity: default_event_capacity(),
            log_level: default_log_level(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "credential-cache")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".credential-cache"))
}

fn default_log_file() -> PathBuf {
    PathBuf::from("credentials.json")
}

const fn default_history_capacity() -> usize {
    1024
}

const fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CacheConfig {
    /// Configuration rooted at `root_dir` with every other field defaulted.
    #[must_use]
    pub fn with_root_dir(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the credential log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.root_dir.join(&self.log_file)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
