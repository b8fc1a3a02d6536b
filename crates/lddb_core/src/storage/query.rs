//! Reference lookups expressed as structural containment predicates.
//!
//! # Responsibility
//! - Build the JSON needles for reverse-reference, relation and quotation
//!   lookups.
//! - Run them against `descriptions.entry`, `descriptions.items` and
//!   `descriptions.quoted` through the `json_contains` SQL function.
//!
//! # Invariants
//! - A relation matches as a single reference or as a list containing one,
//!   under the entry or under any item; any variant is sufficient.
//! - Documents without the expected substructure never match and never error.
//! - Relation/quotation results carry no ordering guarantee beyond the
//!   backing store's default.

use super::assemble::{record_from_row, RECORD_COLUMNS};
use super::StorageResult;
use crate::config::PageLimits;
use crate::db::contains::JSON_CONTAINS_FN;
use crate::db::TableNames;
use crate::model::record::Record;
use crate::model::{GRAPH_KEY, ID_KEY};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::{json, Value};
use std::collections::VecDeque;

const ENTRY_PATH: &str = "$.descriptions.entry";
const ITEMS_PATH: &str = "$.descriptions.items";
const QUOTED_PATH: &str = "$.descriptions.quoted";

/// Rows fetched per round trip by [`RecordIds`].
pub const RECORD_ID_CHUNK: u32 = 256;

/// Node reference `{"@id": identifier}`.
pub fn reference(identifier: &str) -> Value {
    json!({ ID_KEY: identifier })
}

/// Needle matching an entry that is (or contains) a reference to `identifier`.
pub fn entry_needle(identifier: &str) -> Value {
    reference(identifier)
}

/// Needle matching an item list with an element referencing `identifier`.
pub fn items_needle(identifier: &str) -> Value {
    json!([reference(identifier)])
}

/// The four relation needles, in predicate order: entry with single
/// reference, entry with reference list, items with single reference,
/// items with reference list.
pub fn relation_needles(relation: &str, target: &str) -> [Value; 4] {
    let single = json!({ relation: reference(target) });
    let list = json!({ relation: [reference(target)] });
    [
        single.clone(),
        list.clone(),
        json!([single]),
        json!([list]),
    ]
}

/// Needle matching a quotation wrapper whose graph is `identifier`.
pub fn quotation_needle(identifier: &str) -> Value {
    json!([{ GRAPH_KEY: reference(identifier) }])
}

fn contains_at(path: &str, placeholder: &str) -> String {
    format!("{JSON_CONTAINS_FN}(data -> '{path}', {placeholder})")
}

pub(crate) fn find_by_relation(
    conn: &Connection,
    tables: &TableNames,
    page: &PageLimits,
    relation: &str,
    target: &str,
    limit: Option<u32>,
    offset: Option<u32>,
) -> StorageResult<Vec<Record>> {
    let (limit, offset) = page.normalize(limit, offset);
    let [entry_single, entry_list, items_single, items_list] = relation_needles(relation, target);
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM {records}
         WHERE {} OR {} OR {} OR {}
         LIMIT ?5 OFFSET ?6;",
        contains_at(ENTRY_PATH, "?1"),
        contains_at(ENTRY_PATH, "?2"),
        contains_at(ITEMS_PATH, "?3"),
        contains_at(ITEMS_PATH, "?4"),
        records = tables.records()
    );
    let binds = vec![
        SqlValue::Text(entry_single.to_string()),
        SqlValue::Text(entry_list.to_string()),
        SqlValue::Text(items_single.to_string()),
        SqlValue::Text(items_list.to_string()),
        SqlValue::Integer(i64::from(limit)),
        SqlValue::Integer(i64::from(offset)),
    ];
    collect_records(conn, &sql, binds)
}

pub(crate) fn find_by_quotation(
    conn: &Connection,
    tables: &TableNames,
    page: &PageLimits,
    identifier: &str,
    limit: Option<u32>,
    offset: Option<u32>,
) -> StorageResult<Vec<Record>> {
    let (limit, offset) = page.normalize(limit, offset);
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM {records}
         WHERE {}
         LIMIT ?2 OFFSET ?3;",
        contains_at(QUOTED_PATH, "?1"),
        records = tables.records()
    );
    let binds = vec![
        SqlValue::Text(quotation_needle(identifier).to_string()),
        SqlValue::Integer(i64::from(limit)),
        SqlValue::Integer(i64::from(offset)),
    ];
    collect_records(conn, &sql, binds)
}

fn collect_records(
    conn: &Connection,
    sql: &str,
    binds: Vec<SqlValue>,
) -> StorageResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(record_from_row(row)?);
    }
    Ok(records)
}

/// Lazy, restartable sequence of identifiers of records describing a node.
///
/// Matches records whose `descriptions.entry` or any `descriptions.items`
/// element contains `{"@id": identifier}`. Rows are fetched in keyset-paged
/// chunks ordered by record identifier, so the sequence is unbounded in
/// total size but bounded in memory. An error ends the sequence.
pub struct RecordIds<'s> {
    conn: &'s Connection,
    sql: String,
    entry_needle: String,
    items_needle: String,
    after: Option<String>,
    buffer: VecDeque<String>,
    exhausted: bool,
}

impl<'s> RecordIds<'s> {
    pub(crate) fn new(conn: &'s Connection, tables: &TableNames, identifier: &str) -> Self {
        let sql = format!(
            "SELECT id FROM {records}
             WHERE (?1 IS NULL OR id > ?1)
               AND ({} OR {})
             ORDER BY id ASC
             LIMIT {RECORD_ID_CHUNK};",
            contains_at(ITEMS_PATH, "?2"),
            contains_at(ENTRY_PATH, "?3"),
            records = tables.records()
        );
        Self {
            conn,
            sql,
            entry_needle: entry_needle(identifier).to_string(),
            items_needle: items_needle(identifier).to_string(),
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Rewinds to the first matching identifier.
    pub fn restart(&mut self) {
        self.after = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    fn fetch_chunk(&mut self) -> StorageResult<()> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(&self.sql)?;
        let mut rows = stmt.query(params![
            self.after.as_deref(),
            self.items_needle.as_str(),
            self.entry_needle.as_str()
        ])?;
        let mut fetched = 0u32;
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            self.buffer.push_back(id);
            fetched += 1;
        }
        if fetched < RECORD_ID_CHUNK {
            self.exhausted = true;
        }
        self.after = self.buffer.back().cloned().or_else(|| self.after.take());
        Ok(())
    }
}

impl Iterator for RecordIds<'_> {
    type Item = StorageResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_chunk() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
