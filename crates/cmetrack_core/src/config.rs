//! Runtime configuration for embedding hosts and the CLI probe.
//!
//! Every field has a default; `CMETRACK_*` environment variables override
//! them one by one.

use crate::db::PoolSettings;
use crate::query::PageLimits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "CMETRACK_DB_PATH";
pub const ENV_POOL_MAX_SIZE: &str = "CMETRACK_POOL_MAX_SIZE";
pub const ENV_POOL_TIMEOUT_SECS: &str = "CMETRACK_POOL_TIMEOUT_SECS";
pub const ENV_PAGE_LIMIT_DEFAULT: &str = "CMETRACK_PAGE_LIMIT_DEFAULT";
pub const ENV_PAGE_LIMIT_MAX: &str = "CMETRACK_PAGE_LIMIT_MAX";
pub const ENV_LOG_LEVEL: &str = "CMETRACK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CMETRACK_LOG_DIR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{key}` must be a positive integer, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },
    #[error("default page limit {default_limit} exceeds maximum {max_limit}")]
    PageLimitOrder { default_limit: u32, max_limit: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub pool_max_size: u32,
    pub pool_timeout_secs: u64,
    pub page_limit_default: u32,
    pub page_limit_max: u32,
    pub log_level: String,
    /// File logging is skipped when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let limits = PageLimits::default();
        Self {
            database_path: PathBuf::from("cmetrack.db"),
            pool_max_size: 8,
            pool_timeout_secs: 30,
            page_limit_default: limits.default_limit,
            page_limit_max: limits.max_limit,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns per variable name.
    ///
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(raw) = read(ENV_POOL_MAX_SIZE) {
            config.pool_max_size = parse_positive(ENV_POOL_MAX_SIZE, &raw)?;
        }
        if let Some(raw) = read(ENV_POOL_TIMEOUT_SECS) {
            config.pool_timeout_secs = u64::from(parse_positive(ENV_POOL_TIMEOUT_SECS, &raw)?);
        }
        if let Some(raw) = read(ENV_PAGE_LIMIT_DEFAULT) {
            config.page_limit_default = parse_positive(ENV_PAGE_LIMIT_DEFAULT, &raw)?;
        }
        if let Some(raw) = read(ENV_PAGE_LIMIT_MAX) {
            config.page_limit_max = parse_positive(ENV_PAGE_LIMIT_MAX, &raw)?;
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        if config.page_limit_default > config.page_limit_max {
            return Err(ConfigError::PageLimitOrder {
                default_limit: config.page_limit_default,
                max_limit: config.page_limit_max,
            });
        }
        Ok(config)
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.page_limit_default,
            max_limit: self.page_limit_max,
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            database_path: self.database_path.clone(),
            max_size: self.pool_max_size,
            connection_timeout: Duration::from_secs(self.pool_timeout_secs),
        }
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}
