//! Process configuration resolved from environment variables.
//!
//! # Invariants
//! - Blank values are treated as unset.
//! - Resolution never fails; missing or unparsable values fall back to defaults.

use crate::logging::default_log_level;
use std::path::PathBuf;

/// SQLite database file path.
pub const DB_PATH_ENV: &str = "CURRICULUM_DB_PATH";
/// Log level (`trace|debug|info|warn|error`).
pub const LOG_LEVEL_ENV: &str = "CURRICULUM_LOG_LEVEL";
/// Absolute directory for rolling log files. Logging stays off when unset.
pub const LOG_DIR_ENV: &str = "CURRICULUM_LOG_DIR";
/// HTTP listen address.
pub const BIND_ADDR_ENV: &str = "CURRICULUM_BIND_ADDR";
/// Minimum age in seconds before unreferenced content may be swept.
pub const SWEEP_GRACE_SECS_ENV: &str = "CURRICULUM_SWEEP_GRACE_SECS";

const DEFAULT_DB_FILE_NAME: &str = "curriculum.sqlite3";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";
const DEFAULT_SWEEP_GRACE_SECS: u64 = 3600;

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub bind_addr: String,
    pub sweep_grace_secs: u64,
}

impl CoreConfig {
    /// Resolves configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
            bind_addr: read(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            sweep_grace_secs: read(SWEEP_GRACE_SECS_ENV)
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_GRACE_SECS),
        }
    }

    /// Configuration pointing at one database file with default logging.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            sweep_grace_secs: DEFAULT_SWEEP_GRACE_SECS,
        }
    }
}
