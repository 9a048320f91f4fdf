//! Connection bootstrap utilities for the SQLite driver.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections from `StoreConfig`.
//! - Configure connection pragmas required by core behavior.
//!
//! # Invariants
//! - Returned stores have `foreign_keys=ON` and the configured busy timeout.
//! - No schema is created here; tables are provisioned by the caller.

use super::sqlite::SqliteStore;
use super::DbResult;
use crate::config::StoreConfig;
use log::{error, info};
use rusqlite::Connection;
use std::time::{Duration, Instant};

/// Opens the SQLite store described by `config`.
///
/// `config.path == None` selects a private in-memory database.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_store(config: &StoreConfig) -> DbResult<SqliteStore> {
    match config.path.as_deref() {
        Some(path) => open_with("file", || Connection::open(path), config.busy_timeout),
        None => open_with("memory", Connection::open_in_memory, config.busy_timeout),
    }
}

/// Opens an in-memory SQLite store with default settings.
pub fn open_store_in_memory() -> DbResult<SqliteStore> {
    open_store(&StoreConfig::in_memory())
}

fn open_with(
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
    busy_timeout: Duration,
) -> DbResult<SqliteStore> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = open()
        .map_err(Into::into)
        .and_then(|conn| bootstrap_connection(&conn, busy_timeout).map(|()| conn));

    match conn {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(SqliteStore::from_connection(conn))
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
