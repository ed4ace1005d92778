// ABOUTME: Configuration loading for the worklog binary.
// ABOUTME: Resolves the entries file location and retention window from environment variables.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;
use worklog_store::DEFAULT_RETENTION_DAYS;

/// File name of the entries store inside the data directory.
pub const ENTRIES_FILE_NAME: &str = "entries.jsonl";

/// Subdirectory of the platform config dir that holds worklog data.
pub const APP_DIR_NAME: &str = "worklog";

/// Longest accepted retention window, about a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WORKLOG_RETENTION_DAYS must be a whole number of days from 1 to {max}, got {0:?}", max = MAX_RETENTION_DAYS)]
    InvalidRetention(String),

    #[error("could not determine a config directory; set WORKLOG_FILE or WORKLOG_HOME")]
    NoConfigDir,
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct WorklogConfig {
    pub store_path: PathBuf,
    pub retention: Duration,
}

impl WorklogConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - WORKLOG_FILE: full path of the entries file
    /// - WORKLOG_HOME: directory holding entries.jsonl (ignored if WORKLOG_FILE is set)
    /// - WORKLOG_RETENTION_DAYS: days a deleted entry is kept before purge (default: 7)
    ///
    /// Without either path variable the file lives in the platform config
    /// directory, e.g. ~/.config/worklog/entries.jsonl on Linux.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_path = match (var("WORKLOG_FILE"), var("WORKLOG_HOME")) {
            (Some(file), _) => PathBuf::from(file),
            (None, Some(home)) => PathBuf::from(home).join(ENTRIES_FILE_NAME),
            (None, None) => default_config_dir(&var)?
                .join(APP_DIR_NAME)
                .join(ENTRIES_FILE_NAME),
        };

        let retention = match var("WORKLOG_RETENTION_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| (1..=MAX_RETENTION_DAYS).contains(d))
                .and_then(Duration::try_days)
                .ok_or(ConfigError::InvalidRetention(raw))?,
            None => Duration::days(DEFAULT_RETENTION_DAYS),
        };

        Ok(Self {
            store_path,
            retention,
        })
    }
}

fn default_config_dir<F>(var: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    dirs::config_dir()
        .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok_or(ConfigError::NoConfigDir)
}
