//! Append-only version ledger.
//!
//! # Invariants
//! - At most one row per `(id, checksum)`, enforced by the table's UNIQUE
//!   constraint; the insert is a single conditional statement, never a
//!   read followed by a write.
//! - Any historical checksum counts as seen, not only the latest one.

use super::assemble::{version_from_row, VERSION_COLUMNS};
use super::StorageResult;
use crate::db::TableNames;
use crate::model::record::Version;
use rusqlite::{params, Connection, Transaction};

/// Serialized payload of one version row.
pub(crate) struct VersionRow<'a> {
    pub identifier: &'a str,
    pub checksum: &'a str,
    pub data_json: &'a str,
    pub manifest_json: &'a str,
    pub now: &'a str,
}

/// Inserts a version unless `(identifier, checksum)` is already recorded.
///
/// Returns whether a row was inserted.
pub(crate) fn try_append_version(
    tx: &Transaction<'_>,
    tables: &TableNames,
    row: &VersionRow<'_>,
) -> StorageResult<bool> {
    let inserted = tx.execute(
        &format!(
            "INSERT INTO {versions} (id, checksum, data, manifest, created, modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id, checksum) DO NOTHING;",
            versions = tables.versions()
        ),
        params![
            row.identifier,
            row.checksum,
            row.data_json,
            row.manifest_json,
            row.now
        ],
    )?;
    Ok(inserted > 0)
}

/// Lists every version of `identifier`, oldest first.
pub(crate) fn list_versions(
    conn: &Connection,
    tables: &TableNames,
    identifier: &str,
) -> StorageResult<Vec<Version>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS}
         FROM {versions}
         WHERE id = ?1
         ORDER BY modified ASC, pk ASC;",
        versions = tables.versions()
    ))?;
    let mut rows = stmt.query([identifier])?;
    let mut versions = Vec::new();
    while let Some(row) = rows.next()? {
        versions.push(version_from_row(row)?);
    }
    Ok(versions)
}

