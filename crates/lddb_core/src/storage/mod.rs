//! Versioned document storage over one SQLite session.
//!
//! # Responsibility
//! - Own the connection and table names of one logical document store.
//! - Run every write as one transaction: checksum, conditional version
//!   append, conditional current-state upsert.
//! - Serve exact-match reads, history, and containment-based lookups.
//!
//! # Invariants
//! - A write either commits all of its effects or none; the transaction
//!   guard rolls back on every early return.
//! - The current-state row changes only when its content was never seen
//!   before for that identifier (or versioning is disabled).
//! - Reads never fail on absent identifiers; they return `None` or a
//!   `RecordStatus` with `exists == false`.

mod assemble;
mod current;
mod ledger;
pub mod query;

use crate::checksum::{checksum, strip_store_fields};
use crate::config::StorageConfig;
use crate::db::{open_db, open_db_in_memory, DbError, TableNames};
use crate::model::record::{
    format_timestamp, Document, Manifest, Record, RecordStatus, StoreRequest, Version,
};
use chrono::Utc;
use current::CurrentRow;
use ledger::VersionRow;
use log::{debug, error, info};
use query::RecordIds;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer error.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    /// Document or manifest could not be encoded.
    Serialization(serde_json::Error),
    /// Identifier is empty.
    InvalidIdentifier(String),
    /// Persisted state cannot be converted to the read model.
    InvalidData(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "failed to encode document: {err}"),
            Self::InvalidIdentifier(id) => write!(f, "invalid record identifier `{id}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidIdentifier(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Read and write API of a versioned document store.
///
/// Reads take `&self`; writes take `&mut self`, so one store value never has
/// more than one transaction in flight.
pub trait RecordRepository {
    /// Exact-match lookup of the current state, tombstones included.
    fn get_record(&self, identifier: &str) -> StorageResult<Option<Record>>;
    /// Existence and timestamps without loading the document.
    fn get_record_status(&self, identifier: &str) -> StorageResult<RecordStatus>;
    /// Identifiers of records whose entry or items describe `identifier`.
    fn find_record_ids(&self, identifier: &str) -> RecordIds<'_>;
    /// Records whose entry or items reference `target` through `relation`.
    fn find_by_relation(
        &self,
        relation: &str,
        target: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> StorageResult<Vec<Record>>;
    /// Records quoting the graph `identifier`.
    fn find_by_quotation(
        &self,
        identifier: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> StorageResult<Vec<Record>>;
    /// Full history, oldest first.
    fn get_all_versions(&self, identifier: &str) -> StorageResult<Vec<Version>>;
    /// Live record counts per entry `@type`.
    fn count_by_type(&self) -> StorageResult<Vec<(String, u64)>>;
    /// Stores one document and returns the record as stored afterwards.
    fn store(
        &mut self,
        identifier: &str,
        data: Document,
        manifest: Option<Manifest>,
    ) -> StorageResult<Record>;
    /// Stores all items in one transaction; returns how many had new content.
    fn bulk_store(&mut self, items: Vec<StoreRequest>) -> StorageResult<usize>;
}

/// SQLite-backed document store for one base table.
pub struct Storage {
    conn: Connection,
    tables: TableNames,
    config: StorageConfig,
}

/// Outcome of the write steps for one item, before commit.
struct Staged {
    identifier: String,
    is_new: bool,
}

impl Storage {
    /// Opens (and migrates) a file-backed store.
    pub fn open(path: impl AsRef<Path>, config: StorageConfig) -> StorageResult<Self> {
        let tables = TableNames::for_base(&config.base_table)?;
        let conn = open_db(path, &tables)?;
        Ok(Self::with_connection(conn, tables, config))
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory(config: StorageConfig) -> StorageResult<Self> {
        let tables = TableNames::for_base(&config.base_table)?;
        let conn = open_db_in_memory(&tables)?;
        Ok(Self::with_connection(conn, tables, config))
    }

    fn with_connection(conn: Connection, tables: TableNames, config: StorageConfig) -> Self {
        info!(
            "event=storage_ready module=storage status=ok table={} versions_table={} versioning={}",
            tables.records(),
            tables.versions(),
            config.versioning
        );
        Self {
            conn,
            tables,
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }
}

/// Runs `work` inside an IMMEDIATE transaction and commits only if it
/// succeeds. Dropping the uncommitted guard on any error rolls back.
fn in_write_transaction<T>(
    conn: &mut Connection,
    work: impl FnOnce(&Transaction<'_>) -> StorageResult<T>,
) -> StorageResult<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = work(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Runs the checksum, ledger and current-state steps for one item inside `tx`.
fn stage_item(
    tx: &Transaction<'_>,
    tables: &TableNames,
    versioning: bool,
    request: StoreRequest,
) -> StorageResult<Staged> {
    let StoreRequest {
        identifier,
        mut data,
        manifest,
    } = request;
    if identifier.is_empty() {
        return Err(StorageError::InvalidIdentifier(identifier));
    }

    strip_store_fields(&mut data);
    let mut manifest = manifest.unwrap_or_default().for_storage();
    manifest.checksum = Some(checksum(&data)?);

    let data_json = serde_json::to_string(&data)?;
    let manifest_json = serde_json::to_string(&manifest)?;
    let now = format_timestamp(Utc::now());
    let item_checksum = manifest.checksum.as_deref().unwrap_or_default();

    let is_new = if versioning {
        ledger::try_append_version(
            tx,
            tables,
            &VersionRow {
                identifier: &identifier,
                checksum: item_checksum,
                data_json: &data_json,
                manifest_json: &manifest_json,
                now: &now,
            },
        )?
    } else {
        true
    };

    if is_new {
        current::upsert(
            tx,
            tables,
            &CurrentRow {
                identifier: &identifier,
                data_json: &data_json,
                manifest_json: &manifest_json,
                deleted: manifest.deleted,
                now: &now,
            },
        )?;
    }

    debug!(
        "event=record_stage module=storage status=ok id={} checksum={} new_content={}",
        identifier, item_checksum, is_new
    );

    Ok(Staged { identifier, is_new })
}

impl RecordRepository for Storage {
    fn get_record(&self, identifier: &str) -> StorageResult<Option<Record>> {
        current::get_record(&self.conn, &self.tables, identifier)
    }

    fn get_record_status(&self, identifier: &str) -> StorageResult<RecordStatus> {
        current::get_record_status(&self.conn, &self.tables, identifier)
    }

    fn find_record_ids(&self, identifier: &str) -> RecordIds<'_> {
        RecordIds::new(&self.conn, &self.tables, identifier)
    }

    fn find_by_relation(
        &self,
        relation: &str,
        target: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> StorageResult<Vec<Record>> {
        query::find_by_relation(
            &self.conn,
            &self.tables,
            &self.config.page,
            relation,
            target,
            limit,
            offset,
        )
    }

    fn find_by_quotation(
        &self,
        identifier: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> StorageResult<Vec<Record>> {
        query::find_by_quotation(
            &self.conn,
            &self.tables,
            &self.config.page,
            identifier,
            limit,
            offset,
        )
    }

    fn get_all_versions(&self, identifier: &str) -> StorageResult<Vec<Version>> {
        if self.config.versioning {
            return ledger::list_versions(&self.conn, &self.tables, identifier);
        }

        let Some(record) = self.get_record(identifier)? else {
            return Ok(Vec::new());
        };
        let status = self.get_record_status(identifier)?;
        let modified = status.modified.ok_or_else(|| {
            StorageError::InvalidData(format!("record `{identifier}` has no modified time"))
        })?;
        Ok(vec![Version {
            identifier: record.identifier,
            checksum: record.manifest.checksum.clone().unwrap_or_default(),
            data: record.data,
            manifest: record.manifest,
            modified,
        }])
    }

    fn count_by_type(&self) -> StorageResult<Vec<(String, u64)>> {
        current::count_by_type(&self.conn, &self.tables)
    }

    fn store(
        &mut self,
        identifier: &str,
        data: Document,
        manifest: Option<Manifest>,
    ) -> StorageResult<Record> {
        let started_at = Instant::now();
        let versioning = self.config.versioning;
        let request = StoreRequest {
            identifier: identifier.to_string(),
            data,
            manifest,
        };

        let tables = &self.tables;
        let staged = match in_write_transaction(&mut self.conn, |tx| {
            stage_item(tx, tables, versioning, request)
        }) {
            Ok(staged) => staged,
            Err(err) => {
                error!(
                    "event=record_store module=storage status=error id={} duration_ms={} rolled_back=true error={}",
                    identifier,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        // Already-seen content writes nothing; the stored row is authoritative.
        let record = self.get_record(&staged.identifier)?.ok_or_else(|| {
            StorageError::InvalidData(format!(
                "record `{}` missing after commit",
                staged.identifier
            ))
        })?;
        info!(
            "event=record_store module=storage status=ok id={} new_content={} duration_ms={}",
            staged.identifier,
            staged.is_new,
            started_at.elapsed().as_millis()
        );
        Ok(record)
    }

    fn bulk_store(&mut self, items: Vec<StoreRequest>) -> StorageResult<usize> {
        let started_at = Instant::now();
        let versioning = self.config.versioning;
        let total = items.len();

        let tables = &self.tables;
        let result = in_write_transaction(&mut self.conn, |tx| {
            let mut new_items = 0;
            for item in items {
                if stage_item(tx, tables, versioning, item)?.is_new {
                    new_items += 1;
                }
            }
            Ok(new_items)
        });

        match result {
            Ok(new_items) => {
                info!(
                    "event=record_bulk_store module=storage status=ok items={} new_content={} duration_ms={}",
                    total,
                    new_items,
                    started_at.elapsed().as_millis()
                );
                Ok(new_items)
            }
            Err(err) => {
                error!(
                    "event=record_bulk_store module=storage status=error items={} duration_ms={} rolled_back=true error={}",
                    total,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}
