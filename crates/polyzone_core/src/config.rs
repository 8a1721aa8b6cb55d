//! Runtime configuration for registry adapters.
//!
//! # Responsibility
//! - Resolve database location, busy timeout and logging settings from
//!   environment-style key/value lookups.
//!
//! # Invariants
//! - No connection or global state is created here; callers pass the
//!   resulting settings to `db::open_db_with` per request.
//! - Unset keys fall back to defaults; set-but-invalid keys are errors.

use crate::db::{StoreSettings, DEFAULT_BUSY_TIMEOUT};
use crate::logging::{default_log_level, normalize_level, normalize_log_dir, LoggingError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "POLYZONE_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "POLYZONE_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "POLYZONE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "POLYZONE_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "polyzone.sqlite3";
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyValue(&'static str),
    InvalidBusyTimeout(String),
    Logging(LoggingError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue(key) => write!(f, "{key} is set but empty"),
            Self::InvalidBusyTimeout(value) => write!(
                f,
                "{ENV_BUSY_TIMEOUT_MS} must be an integer in 1..={MAX_BUSY_TIMEOUT_MS}, got `{value}`"
            ),
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

/// Resolved registry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub log_level: &'static str,
    /// File logging is enabled only when a directory is configured.
    pub log_dir: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl RegistryConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_empty(&lookup, ENV_DB_PATH)? {
            config.db_path = PathBuf::from(path);
        }
        if let Some(raw) = non_empty(&lookup, ENV_BUSY_TIMEOUT_MS)? {
            config.busy_timeout = parse_busy_timeout(&raw)?;
        }
        if let Some(level) = non_empty(&lookup, ENV_LOG_LEVEL)? {
            config.log_level = normalize_level(&level)?;
        }
        if let Some(dir) = non_empty(&lookup, ENV_LOG_DIR)? {
            config.log_dir = Some(normalize_log_dir(&dir)?);
        }

        Ok(config)
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            busy_timeout: self.busy_timeout,
        }
    }
}

fn non_empty<F>(lookup: &F, key: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key)),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

fn parse_busy_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(ms) if (1..=MAX_BUSY_TIMEOUT_MS).contains(&ms) => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidBusyTimeout(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RegistryConfig, ENV_BUSY_TIMEOUT_MS, ENV_DB_PATH, ENV_LOG_LEVEL};
    use crate::db::DEFAULT_BUSY_TIMEOUT;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = RegistryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("polyzone.sqlite3"));
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = RegistryConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/polyzone/zones.db"),
            (ENV_BUSY_TIMEOUT_MS, "250"),
            (ENV_LOG_LEVEL, "WARNING"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/polyzone/zones.db"));
        assert_eq!(config.store_settings().busy_timeout, Duration::from_millis(250));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            RegistryConfig::from_lookup(lookup(&[(ENV_BUSY_TIMEOUT_MS, "0")])),
            Err(ConfigError::InvalidBusyTimeout("0".to_string()))
        );
        assert_eq!(
            RegistryConfig::from_lookup(lookup(&[(ENV_DB_PATH, "  ")])),
            Err(ConfigError::EmptyValue(ENV_DB_PATH))
        );
        assert!(matches!(
            RegistryConfig::from_lookup(lookup(&[("POLYZONE_LOG_DIR", "relative/logs")])),
            Err(ConfigError::Logging(_))
        ));
    }
}
