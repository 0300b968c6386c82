//! Configuration loading and representation.
//!
//! Everything comes from `STOCKBOOK_*` environment variables; unset
//! variables take their defaults, malformed ones are errors.

use std::path::PathBuf;

use thiserror::Error;

use stockbook_observability::LogFormat;

pub const ENV_DATA_FILE: &str = "STOCKBOOK_DATA_FILE";
pub const ENV_RESTOCK_ON_DELETE: &str = "STOCKBOOK_RESTOCK_ON_DELETE";
pub const ENV_MAX_COMMIT_RETRIES: &str = "STOCKBOOK_MAX_COMMIT_RETRIES";
pub const ENV_BCRYPT_COST: &str = "STOCKBOOK_BCRYPT_COST";
pub const ENV_LOG_FORMAT: &str = "STOCKBOOK_LOG_FORMAT";

/// What happens to reserved stock when an order or an order line is deleted.
///
/// Applied the same way to both deletions, whatever the order's status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestockPolicy {
    /// Deletion is a cancellation: reserved units go back to stock.
    #[default]
    Restock,
    /// Deletion only removes the record; stock is left as is.
    Retain,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Snapshot file; `None` keeps everything in memory.
    pub data_file: Option<PathBuf>,
    pub restock_policy: RestockPolicy,
    /// Extra attempts after a concurrency conflict at commit.
    pub max_commit_retries: u32,
    pub bcrypt_cost: u32,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            restock_policy: RestockPolicy::Restock,
            max_commit_retries: 3,
            bcrypt_cost: 12,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_file = lookup(ENV_DATA_FILE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let restock_policy = match lookup(ENV_RESTOCK_ON_DELETE) {
            None => defaults.restock_policy,
            Some(value) => match parse_bool(&value) {
                Some(true) => RestockPolicy::Restock,
                Some(false) => RestockPolicy::Retain,
                None => {
                    return Err(ConfigError::Invalid {
                        key: ENV_RESTOCK_ON_DELETE,
                        value,
                        reason: "expected true or false".to_string(),
                    });
                }
            },
        };

        let max_commit_retries = match lookup(ENV_MAX_COMMIT_RETRIES) {
            None => defaults.max_commit_retries,
            Some(value) => value.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                key: ENV_MAX_COMMIT_RETRIES,
                value: value.clone(),
                reason: e.to_string(),
            })?,
        };

        let bcrypt_cost = match lookup(ENV_BCRYPT_COST) {
            None => defaults.bcrypt_cost,
            Some(value) => {
                let cost = value.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                    key: ENV_BCRYPT_COST,
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
                // bcrypt only accepts work factors in 4..=31.
                if !(4..=31).contains(&cost) {
                    return Err(ConfigError::Invalid {
                        key: ENV_BCRYPT_COST,
                        value,
                        reason: "must be between 4 and 31".to_string(),
                    });
                }
                cost
            }
        };

        let log_format = match lookup(ENV_LOG_FORMAT) {
            None => defaults.log_format,
            Some(value) => value.parse::<LogFormat>().map_err(|e| ConfigError::Invalid {
                key: ENV_LOG_FORMAT,
                value: value.clone(),
                reason: e.to_string(),
            })?,
        };

        Ok(Self {
            data_file,
            restock_policy,
            max_commit_retries,
            bcrypt_cost,
            log_format,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
