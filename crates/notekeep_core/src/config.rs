//! Store configuration.
//!
//! # Responsibility
//! - Resolve the SQLite file location from an explicit value or environment.
//!
//! # Invariants
//! - The database file is always `notes.db` under `path_prefix`.
//! - Nothing here is process-global; callers pass `StoreConfig` down.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DB_FILE_NAME: &str = "notes.db";
pub const DEFAULT_PATH_PREFIX: &str = "data";
pub const PATH_PREFIX_ENV: &str = "PATH_PREFIX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyPathPrefix,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPathPrefix => write!(f, "{PATH_PREFIX_ENV} cannot be empty"),
        }
    }
}

impl Error for ConfigError {}

/// Location of the note store on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    path_prefix: PathBuf,
}

impl StoreConfig {
    pub fn new(path_prefix: impl Into<PathBuf>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
        }
    }

    /// Reads `PATH_PREFIX`, falling back to `data` when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_value(std::env::var_os(PATH_PREFIX_ENV).map(PathBuf::from))
    }

    fn from_env_value(value: Option<PathBuf>) -> Result<Self, ConfigError> {
        match value {
            Some(prefix) if prefix.as_os_str().is_empty() => Err(ConfigError::EmptyPathPrefix),
            Some(prefix) => Ok(Self::new(prefix)),
            None => Ok(Self::default()),
        }
    }

    pub fn path_prefix(&self) -> &Path {
        &self.path_prefix
    }

    pub fn database_path(&self) -> PathBuf {
        self.path_prefix.join(DB_FILE_NAME)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig};
    use std::path::PathBuf;

    #[test]
    fn default_prefix_is_data_dir() {
        assert_eq!(
            StoreConfig::default().database_path(),
            PathBuf::from("data/notes.db")
        );
    }

    #[test]
    fn env_value_overrides_default() {
        let config = StoreConfig::from_env_value(Some(PathBuf::from("/var/lib/notekeep"))).unwrap();
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/notekeep/notes.db")
        );
    }

    #[test]
    fn empty_env_value_is_rejected() {
        let err = StoreConfig::from_env_value(Some(PathBuf::new())).unwrap_err();
        assert_eq!(err, ConfigError::EmptyPathPrefix);
    }
}
