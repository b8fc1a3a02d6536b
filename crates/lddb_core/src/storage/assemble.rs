//! Row-to-model assembly.
//!
//! Store columns are authoritative for `created`, `modified` and `deleted`;
//! whatever the persisted manifest JSON says about them is overwritten here.

use super::{StorageError, StorageResult};
use crate::model::record::{parse_timestamp, Manifest, Record, Version};
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// Column list every record query selects, in this order.
pub(crate) const RECORD_COLUMNS: &str = "id, data, manifest, created, modified, deleted";

/// Column list every version query selects.
pub(crate) const VERSION_COLUMNS: &str = "id, checksum, data, manifest, created, modified";

pub(crate) fn record_from_row(row: &Row<'_>) -> StorageResult<Record> {
    let identifier: String = row.get("id")?;
    let data = parse_json_column(row, "data", &identifier)?;
    let mut manifest: Manifest = parse_json_column(row, "manifest", &identifier)?;
    let created = timestamp_column(row, "created", &identifier)?;
    let modified = timestamp_column(row, "modified", &identifier)?;
    manifest.deleted = bool_column(row, "deleted", &identifier)?;

    Ok(Record {
        identifier,
        data,
        manifest: manifest.with_timestamps(created, modified),
    })
}

pub(crate) fn version_from_row(row: &Row<'_>) -> StorageResult<Version> {
    let identifier: String = row.get("id")?;
    let checksum: String = row.get("checksum")?;
    let data = parse_json_column(row, "data", &identifier)?;
    let manifest: Manifest = parse_json_column(row, "manifest", &identifier)?;
    let created = timestamp_column(row, "created", &identifier)?;
    let modified = timestamp_column(row, "modified", &identifier)?;

    Ok(Version {
        identifier,
        checksum,
        data,
        manifest: manifest.with_timestamps(created, modified),
        modified,
    })
}

pub(crate) fn timestamp_column(
    row: &Row<'_>,
    column: &str,
    identifier: &str,
) -> StorageResult<DateTime<Utc>> {
    let text: String = row.get(column)?;
    parse_timestamp(&text).ok_or_else(|| {
        StorageError::InvalidData(format!(
            "invalid timestamp `{text}` in column `{column}` of `{identifier}`"
        ))
    })
}

pub(crate) fn bool_column(row: &Row<'_>, column: &str, identifier: &str) -> StorageResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::InvalidData(format!(
            "invalid flag `{other}` in column `{column}` of `{identifier}`"
        ))),
    }
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    column: &str,
    identifier: &str,
) -> StorageResult<T> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text).map_err(|err| {
        StorageError::InvalidData(format!(
            "invalid JSON in column `{column}` of `{identifier}`: {err}"
        ))
    })
}
