//! Record, version and manifest model.
//!
//! # Responsibility
//! - Define the current-state record and its immutable historical versions.
//! - Carry store-owned metadata (`checksum`, timestamps, tombstone flag)
//!   next to the document instead of inside it.
//!
//! # Invariants
//! - `Record::identifier` is never empty.
//! - Timestamps in a returned manifest come from store columns, never from
//!   caller-supplied content.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema-light linked-data document.
pub type Document = Value;

/// Metadata accompanying a stored document.
///
/// Unknown keys supplied by callers are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Content fingerprint computed by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// ISO-8601 creation time, injected on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// ISO-8601 last-change time, injected on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Manifest marking a record as deleted.
    pub fn tombstone() -> Self {
        Self {
            deleted: true,
            ..Self::default()
        }
    }

    /// Returns the manifest with store-maintained timestamps merged in.
    pub(crate) fn with_timestamps(mut self, created: DateTime<Utc>, modified: DateTime<Utc>) -> Self {
        self.created = Some(format_timestamp(created));
        self.modified = Some(format_timestamp(modified));
        self
    }

    /// Returns the manifest as it is persisted: no timestamps, which live in
    /// their own columns.
    pub(crate) fn for_storage(&self) -> Self {
        Self {
            created: None,
            modified: None,
            ..self.clone()
        }
    }
}

/// Current-state document for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub identifier: String,
    pub data: Document,
    pub manifest: Manifest,
}

impl Record {
    pub fn is_deleted(&self) -> bool {
        self.manifest.deleted
    }
}

/// Immutable historical snapshot, unique per `(identifier, checksum)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub identifier: String,
    pub checksum: String,
    pub data: Document,
    pub manifest: Manifest,
    pub modified: DateTime<Utc>,
}

/// Lightweight existence/metadata probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordStatus {
    pub exists: bool,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub deleted: bool,
}

impl RecordStatus {
    /// Status of an identifier that has never been stored.
    pub fn missing() -> Self {
        Self {
            exists: false,
            created: None,
            modified: None,
            deleted: false,
        }
    }
}

/// One input item for single or bulk writes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    pub identifier: String,
    pub data: Document,
    pub manifest: Option<Manifest>,
}

impl StoreRequest {
    pub fn new(identifier: impl Into<String>, data: Document) -> Self {
        Self {
            identifier: identifier.into(),
            data,
            manifest: None,
        }
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

/// Formats a store timestamp as RFC 3339 with microseconds and `Z`.
///
/// The fixed width keeps lexical order equal to chronological order, which
/// the history table relies on for `ORDER BY modified`.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp written by [`format_timestamp`].
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, parse_timestamp, Manifest};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn manifest_keeps_unknown_keys_and_defaults_flags() {
        let manifest: Manifest =
            serde_json::from_value(json!({"collection": "bib", "changedBy": "loader"})).unwrap();
        assert!(!manifest.deleted);
        assert_eq!(manifest.checksum, None);
        assert_eq!(manifest.extra.get("collection"), Some(&json!("bib")));

        let back = serde_json::to_value(&manifest).unwrap();
        assert_eq!(back["changedBy"], json!("loader"));
        assert_eq!(back["deleted"], json!(false));
        assert!(back.get("created").is_none());
    }

    #[test]
    fn storage_form_drops_timestamps_only() {
        let manifest = Manifest {
            checksum: Some("abc".to_string()),
            created: Some("2020-01-01T00:00:00.000000Z".to_string()),
            modified: Some("2020-01-02T00:00:00.000000Z".to_string()),
            deleted: true,
            ..Manifest::default()
        };
        let stored = manifest.for_storage();
        assert_eq!(stored.created, None);
        assert_eq!(stored.modified, None);
        assert_eq!(stored.checksum.as_deref(), Some("abc"));
        assert!(stored.deleted);
    }

    #[test]
    fn timestamps_are_fixed_width_and_parse_back() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();
        let text = format_timestamp(at);
        assert_eq!(text, "2024-03-09T08:07:06.000000Z");
        assert_eq!(parse_timestamp(&text), Some(at));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
