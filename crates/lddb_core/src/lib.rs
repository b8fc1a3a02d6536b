//! Versioned storage for linked-data documents.
//! This crate is the single source of truth for checksum, history and
//! lookup semantics.

pub mod checksum;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod storage;

pub use checksum::checksum;
pub use config::{ConfigError, PageLimits, StorageConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::record::{Document, Manifest, Record, RecordStatus, StoreRequest, Version};
pub use storage::query::RecordIds;
pub use storage::{RecordRepository, Storage, StorageError, StorageResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
