//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the document store.
//! - Register the structural containment SQL function.
//! - Apply per-table schema migrations in deterministic order.
//!
//! # Invariants
//! - Table names are validated before they are spliced into SQL text.
//! - Core code must not read/write documents before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod contains;
pub mod migrations;
mod open;
pub(crate) mod tables;

pub use open::{open_db, open_db_in_memory};
pub use tables::TableNames;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        base_table: String,
        db_version: u32,
        latest_supported: u32,
    },
    InvalidTableName(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                base_table,
                db_version,
                latest_supported,
            } => write!(
                f,
                "schema version {db_version} of table `{base_table}` is newer than supported {latest_supported}"
            ),
            Self::InvalidTableName(name) => write!(
                f,
                "invalid table name `{name}`; expected ASCII letters, digits and underscores"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::InvalidTableName(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
