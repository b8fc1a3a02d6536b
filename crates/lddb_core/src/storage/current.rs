//! Current-state table: latest distinct content per identifier.
//!
//! # Invariants
//! - `created` is written once, on first insert, and never updated.
//! - Callers only upsert when the ledger reported new content (or versioning
//!   is off); otherwise the row and its `modified` stay untouched.

use super::assemble::{bool_column, record_from_row, timestamp_column, RECORD_COLUMNS};
use super::{StorageError, StorageResult};
use crate::db::TableNames;
use crate::model::record::{Record, RecordStatus};
use crate::model::TYPE_KEY;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

/// Serialized payload of one current-state write.
pub(crate) struct CurrentRow<'a> {
    pub identifier: &'a str,
    pub data_json: &'a str,
    pub manifest_json: &'a str,
    pub deleted: bool,
    pub now: &'a str,
}

pub(crate) fn upsert(
    tx: &Transaction<'_>,
    tables: &TableNames,
    row: &CurrentRow<'_>,
) -> StorageResult<()> {
    tx.execute(
        &format!(
            "INSERT INTO {records} (id, data, manifest, created, modified, deleted)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                manifest = excluded.manifest,
                modified = excluded.modified,
                deleted = excluded.deleted;",
            records = tables.records()
        ),
        params![
            row.identifier,
            row.data_json,
            row.manifest_json,
            row.now,
            i64::from(row.deleted),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_record(
    conn: &Connection,
    tables: &TableNames,
    identifier: &str,
) -> StorageResult<Option<Record>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM {records} WHERE id = ?1;",
        records = tables.records()
    ))?;
    let mut rows = stmt.query([identifier])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(record_from_row(row)?));
    }
    Ok(None)
}

pub(crate) fn get_record_status(
    conn: &Connection,
    tables: &TableNames,
    identifier: &str,
) -> StorageResult<RecordStatus> {
    let status = conn
        .query_row(
            &format!(
                "SELECT created, modified, deleted FROM {records} WHERE id = ?1;",
                records = tables.records()
            ),
            [identifier],
            |row| {
                Ok((
                    timestamp_column(row, "created", identifier),
                    timestamp_column(row, "modified", identifier),
                    bool_column(row, "deleted", identifier),
                ))
            },
        )
        .optional()?;

    match status {
        Some((created, modified, deleted)) => Ok(RecordStatus {
            exists: true,
            created: Some(created?),
            modified: Some(modified?),
            deleted: deleted?,
        }),
        None => Ok(RecordStatus::missing()),
    }
}

/// Counts live records per entry `@type`; array-valued types count once per
/// member. Ordered by count descending, then type name.
pub(crate) fn count_by_type(
    conn: &Connection,
    tables: &TableNames,
) -> StorageResult<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT entry_type.value AS rtype, COUNT(*) AS total
         FROM {records} AS rec,
              json_each(rec.data, '$.descriptions.entry.\"{TYPE_KEY}\"') AS entry_type
         WHERE rec.deleted = 0
           AND entry_type.type = 'text'
         GROUP BY entry_type.value
         ORDER BY total DESC, rtype ASC;",
        records = tables.records()
    ))?;
    let mut rows = stmt.query([])?;
    let mut counts = Vec::new();
    while let Some(row) = rows.next()? {
        let rtype: String = row.get("rtype")?;
        let total: i64 = row.get("total")?;
        let total = type_count(&rtype, total)?;
        counts.push((rtype, total));
    }
    Ok(counts)
}

fn type_count(rtype: &str, total: i64) -> StorageResult<u64> {
    u64::try_from(total).map_err(|_| {
        StorageError::InvalidData(format!("invalid count `{total}` for type `{rtype}`"))
    })
}

#[cfg(test)]
mod tests {
    use super::type_count;
    use crate::storage::StorageError;

    #[test]
    fn type_count_rejects_negative_totals() {
        assert_eq!(type_count("Instance", 3).unwrap(), 3);
        assert!(matches!(
            type_count("Instance", -1),
            Err(StorageError::InvalidData(_))
        ));
    }
}
