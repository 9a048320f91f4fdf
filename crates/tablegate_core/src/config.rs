//! Process-level configuration for the store driver and logging.
//!
//! # Responsibility
//! - Describe where the SQLite store lives and how logging is set up.
//! - Read both from environment variables with explicit validation.
//!
//! # Invariants
//! - Unset variables fall back to defaults; malformed ones are errors.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "TABLEGATE_DB";
pub const BUSY_TIMEOUT_ENV: &str = "TABLEGATE_BUSY_TIMEOUT_MS";
pub const LOG_LEVEL_ENV: &str = "TABLEGATE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "TABLEGATE_LOG_DIR";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Location and connection settings of the SQLite store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file; `None` selects an in-memory database.
    pub path: Option<PathBuf>,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Reads `TABLEGATE_DB` and `TABLEGATE_BUSY_TIMEOUT_MS`.
    ///
    /// An unset or `:memory:` path selects an in-memory database.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = non_empty(lookup(DB_PATH_ENV))
            .filter(|path| path != MEMORY_PATH)
            .map(PathBuf::from);

        let busy_timeout = match non_empty(lookup(BUSY_TIMEOUT_ENV)) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue {
                    key: BUSY_TIMEOUT_ENV,
                    value: raw,
                    reason: "expected milliseconds as an unsigned integer",
                })?,
            None => DEFAULT_BUSY_TIMEOUT,
        };

        Ok(Self { path, busy_timeout })
    }
}

/// Logging level and optional log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// File logging is enabled only when a directory is set.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

impl LogConfig {
    /// Reads `TABLEGATE_LOG_LEVEL` and `TABLEGATE_LOG_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            level: non_empty(lookup(LOG_LEVEL_ENV))
                .unwrap_or_else(|| default_log_level().to_string()),
            dir: non_empty(lookup(LOG_DIR_ENV)).map(PathBuf::from),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LogConfig, StoreConfig, BUSY_TIMEOUT_ENV, DB_PATH_ENV, LOG_DIR_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn store_config_defaults_to_memory() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::in_memory());

        let config = StoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, ":memory:")])).unwrap();
        assert_eq!(config.path, None);
    }

    #[test]
    fn store_config_reads_path_and_timeout() {
        let config = StoreConfig::from_lookup(lookup(&[
            (DB_PATH_ENV, " /var/lib/tablegate.db "),
            (BUSY_TIMEOUT_ENV, "250"),
        ]))
        .unwrap();

        assert_eq!(config.path, Some(PathBuf::from("/var/lib/tablegate.db")));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn store_config_rejects_malformed_timeout() {
        let err = StoreConfig::from_lookup(lookup(&[(BUSY_TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == BUSY_TIMEOUT_ENV
        ));
    }

    #[test]
    fn log_config_enables_files_only_with_dir() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config.dir, None);
        assert!(!config.level.is_empty());

        let config = LogConfig::from_lookup(lookup(&[(LOG_DIR_ENV, "/tmp/tablegate-logs")]));
        assert_eq!(config.dir, Some(PathBuf::from("/tmp/tablegate-logs")));
    }
}
