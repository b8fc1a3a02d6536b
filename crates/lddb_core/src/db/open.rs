//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure pragmas and register SQL functions required by queries.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `json_contains` registered.
//! - Returned connections have migrations for the given tables fully applied.
//! - File-backed connections run in WAL mode so readers never block writers.

use super::contains;
use super::migrations::apply_migrations;
use super::{DbResult, TableNames};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file and applies all pending migrations for
/// `tables`.
///
/// # Side effects
/// - Creates the database file when it does not exist.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, tables: &TableNames) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file table={}",
        tables.records()
    );

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let result = enable_wal(&conn)
        .map_err(Into::into)
        .and_then(|()| bootstrap_connection(&mut conn, tables));
    finish_open(conn, result, "file", started_at)
}

/// Opens an in-memory SQLite database and applies all pending migrations for
/// `tables`.
///
/// Every call yields a fresh, private database.
pub fn open_db_in_memory(tables: &TableNames) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=memory table={}",
        tables.records()
    );

    let mut conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let result = bootstrap_connection(&mut conn, tables);
    finish_open(conn, result, "memory", started_at)
}

fn finish_open(
    conn: Connection,
    result: DbResult<()>,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    match result {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn enable_wal(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode answers with the resulting mode as a row.
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    Ok(())
}

fn bootstrap_connection(conn: &mut Connection, tables: &TableNames) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    contains::register(conn)?;
    apply_migrations(conn, tables)?;
    Ok(())
}
