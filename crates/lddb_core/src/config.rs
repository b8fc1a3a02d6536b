//! Storage configuration and pagination policy.
//!
//! # Responsibility
//! - Carry construction parameters for one document store.
//! - Normalize caller-supplied `limit`/`offset` pairs.
//!
//! # Invariants
//! - A limit at or above `max_limit` falls back to `default_limit`; it is
//!   never clamped to `max_limit - 1`.
//! - `validate()` must pass before a config is used to open a store.

use crate::db::tables::is_valid_table_name;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DEFAULT_BASE_TABLE: &str = "lddb";
pub const DEFAULT_MAX_LIMIT: u32 = 1000;
pub const DEFAULT_LIMIT: u32 = 100;

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidTableName(String),
    InvalidPageLimits { max_limit: u32, default_limit: u32 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::InvalidTableName(name) => write!(f, "invalid base table name `{name}`"),
            Self::InvalidPageLimits {
                max_limit,
                default_limit,
            } => write!(
                f,
                "default_limit {default_limit} must be at least 1 and below max_limit {max_limit}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidTableName(_) => None,
            Self::InvalidPageLimits { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Pagination bounds for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLimits {
    /// Exclusive upper bound for caller-supplied limits.
    pub max_limit: u32,
    /// Limit used when none is supplied or the supplied one is too large.
    pub default_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            max_limit: DEFAULT_MAX_LIMIT,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl PageLimits {
    /// Returns the effective `(limit, offset)` pair.
    ///
    /// ```
    /// use lddb_core::PageLimits;
    ///
    /// let page = PageLimits::default();
    /// assert_eq!(page.normalize(Some(1500), None), (100, 0));
    /// assert_eq!(page.normalize(Some(5), Some(10)), (5, 10));
    /// ```
    pub fn normalize(&self, limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
        let limit = match limit {
            Some(value) if value < self.max_limit => value,
            _ => self.default_limit,
        };
        (limit, offset.unwrap_or(0))
    }
}

/// Construction parameters for a [`crate::Storage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Current-state table name; history lives in `<base_table>__versions`.
    pub base_table: String,
    /// When `false` the version ledger is bypassed and every store is new.
    pub versioning: bool,
    pub page: PageLimits,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_table: DEFAULT_BASE_TABLE.to_string(),
            versioning: true,
            page: PageLimits::default(),
        }
    }
}

impl StorageConfig {
    /// Default config with a different base table.
    pub fn for_table(base_table: impl Into<String>) -> Self {
        Self {
            base_table: base_table.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a JSON config. Missing keys take defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_table_name(&self.base_table) {
            return Err(ConfigError::InvalidTableName(self.base_table.clone()));
        }
        let PageLimits {
            max_limit,
            default_limit,
        } = self.page;
        if default_limit == 0 || default_limit >= max_limit {
            return Err(ConfigError::InvalidPageLimits {
                max_limit,
                default_limit,
            });
        }
        Ok(())
    }
}
