//! Runtime configuration.
//!
//! # Responsibility
//! - Describe where local data lives and which storage backend is active.
//! - Load configuration from a JSON file with defaults for missing keys.
//!
//! # Invariants
//! - A missing config file is not an error; defaults apply.
//! - The undo window is always at least one second.

use crate::db::DB_FILE_NAME;
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default undo window applied to family deletions.
pub const DEFAULT_UNDO_WINDOW_SECS: u64 = 60;
const LOG_DIR_NAME: &str = "logs";

/// Storage backend chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Browser-local style key-value fallback persisted in SQLite.
    #[default]
    Local,
    /// Hosted document store.
    Remote,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Directory holding the local store database and logs.
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    pub undo_window_secs: u64,
    /// `None` falls back to the build-mode default.
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            backend: BackendKind::Local,
            undo_window_secs: DEFAULT_UNDO_WINDOW_SECS,
            log_level: None,
        }
    }
}

impl AppConfig {
    /// Parses configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, returning defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json_str(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: err,
            }),
        }
    }

    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_window_secs)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    pub fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.undo_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "undoWindowSecs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, BackendKind, ConfigError, DEFAULT_UNDO_WINDOW_SECS};
    use std::path::PathBuf;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json_str(r#"{"backend":"remote"}"#).unwrap();
        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(config.undo_window_secs, DEFAULT_UNDO_WINDOW_SECS);
        assert_eq!(config.data_dir, PathBuf::from("."));
    }

    #[test]
    fn log_level_falls_back_to_build_default() {
        let config = AppConfig::default();
        assert_eq!(config.effective_log_level(), crate::logging::default_log_level());

        let config = AppConfig::from_json_str(r#"{"logLevel":"debug"}"#).unwrap();
        assert_eq!(config.effective_log_level(), "debug");
    }

    #[test]
    fn zero_undo_window_is_rejected() {
        let err = AppConfig::from_json_str(r#"{"undoWindowSecs":0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
