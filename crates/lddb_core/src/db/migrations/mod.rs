//! Per-table SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations for one base table atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied versions are tracked per base table in `lddb_schema`, so several
//!   document stores can share one database file.
//! - Templates only receive names that passed `TableNames` validation.

use crate::db::{DbError, DbResult, TableNames};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

/// Bookkeeping table shared by every document store in a database.
pub const SCHEMA_TABLE: &str = "lddb_schema";

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_lookup_indexes.sql"),
    },
    Migration {
        version: 3,
        sql: include_str!("0003_drop_entry_id_index.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations for `tables` on the provided connection.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the recorded version is newer
///   than [`latest_version`].
pub fn apply_migrations(conn: &mut Connection, tables: &TableNames) -> DbResult<()> {
    ensure_schema_table(conn)?;

    let current_version = schema_version(conn, tables.records())?.unwrap_or(0);
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            base_table: tables.records().to_string(),
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(&render(migration.sql, tables))?;
        tx.execute(
            &format!(
                "INSERT INTO {SCHEMA_TABLE} (base_table, version) VALUES (?1, ?2)
                 ON CONFLICT(base_table) DO UPDATE SET version = excluded.version;"
            ),
            rusqlite::params![tables.records(), migration.version],
        )?;
    }
    tx.commit()?;

    Ok(())
}

/// Returns the recorded schema version for `base_table`, if any.
pub fn schema_version(conn: &Connection, base_table: &str) -> DbResult<Option<u32>> {
    let version = conn
        .query_row(
            &format!("SELECT version FROM {SCHEMA_TABLE} WHERE base_table = ?1;"),
            [base_table],
            |row| row.get::<_, u32>(0),
        )
        .optional()?;
    Ok(version)
}

fn ensure_schema_table(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA_TABLE} (
            base_table TEXT PRIMARY KEY NOT NULL,
            version INTEGER NOT NULL
        );"
    ))?;
    Ok(())
}

fn render(template: &str, tables: &TableNames) -> String {
    template
        .replace("{versions}", tables.versions())
        .replace("{records}", tables.records())
}

#[cfg(test)]
mod tests {
    use super::{latest_version, render, MIGRATIONS};
    use crate::db::TableNames;

    #[test]
    fn migration_versions_are_strictly_increasing() {
        let mut previous = 0;
        for migration in MIGRATIONS {
            assert!(migration.version > previous);
            previous = migration.version;
        }
        assert_eq!(latest_version(), previous);
    }

    #[test]
    fn render_leaves_no_placeholders() {
        let tables = TableNames::for_base("works").unwrap();
        for migration in MIGRATIONS {
            let sql = render(migration.sql, &tables);
            assert!(!sql.contains("{records}"));
            assert!(!sql.contains("{versions}"));
        }
        assert!(render(MIGRATIONS[0].sql, &tables).contains("works__versions"));
    }
}
