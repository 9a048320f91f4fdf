//! SQLite-backed store driver.
//!
//! # Responsibility
//! - Implement `Store` over a single `rusqlite` connection.
//! - Map SQLite rows and column metadata into `Record` / `TableSchema`.
//!
//! # Invariants
//! - Table and column names are always quoted; values are always bound.
//! - A filter column must exist on the table.
//! - A transaction holds the connection lock until it commits, rolls back
//!   or is dropped.
//! - Blob cells are rejected instead of being coerced into text.

use crate::db::store::{RecordId, Store, StoreTransaction};
use crate::db::{DbError, DbResult};
use crate::model::record::Record;
use crate::model::schema::{ColumnInfo, TableSchema};
use crate::model::value::Value;
use async_trait::async_trait;
use chrono::SecondsFormat;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

static CHAR_LENGTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:n|var|nvar|varying\s+)?char(?:acter)?(?:\s+varying)?\s*\(\s*(\d+)\s*\)")
        .expect("valid char length regex")
});

/// Store driver over one shared SQLite connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wraps an already configured connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with exclusive access to the underlying connection.
    ///
    /// Intended for bootstrap work outside the driver contract, such as
    /// provisioning tables.
    pub async fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock().await;
        f(&conn)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn column_info(&self, table: &str) -> DbResult<TableSchema> {
        let conn = self.conn.lock().await;
        load_table_info(&conn, table)
    }

    async fn select_all(&self, table: &str) -> DbResult<Vec<Record>> {
        let sql = format!("SELECT * FROM {};", quote_identifier(table)?);
        let conn = self.conn.lock().await;
        query_records(&conn, &sql, &[])
    }

    async fn select_where(
        &self,
        table: &str,
        column: &str,
        term: &Value,
    ) -> DbResult<Vec<Record>> {
        let table = quote_identifier(table)?;
        let conn = self.conn.lock().await;
        let column = resolve_column(&conn, &table, column)?;
        let sql = format!(
            "SELECT * FROM {table} WHERE {} = ?1;",
            quote_identifier(&column)?
        );
        query_records(&conn, &sql, &[term])
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN;")?;
        Ok(Box::new(SqliteTransaction { conn: Some(conn) }))
    }
}

/// Open SQLite transaction that owns the connection lock.
pub struct SqliteTransaction {
    conn: Option<OwnedMutexGuard<Connection>>,
}

impl SqliteTransaction {
    fn active(&self) -> DbResult<&Connection> {
        self.conn
            .as_deref()
            .ok_or_else(|| DbError::Driver("transaction already finished".to_string()))
    }

    fn finish(&mut self) -> DbResult<OwnedMutexGuard<Connection>> {
        self.conn
            .take()
            .ok_or_else(|| DbError::Driver("transaction already finished".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn insert_returning_id(
        &mut self,
        table: &str,
        record: &Record,
    ) -> DbResult<Vec<RecordId>> {
        let conn = self.active()?;
        insert_record(conn, table, record)
    }

    async fn commit(&mut self) -> DbResult<()> {
        let conn = self.finish()?;
        if let Err(err) = conn.execute_batch("COMMIT;") {
            // A failed COMMIT can leave the transaction open; keep it for
            // rollback or drop.
            self.conn = Some(conn);
            return Err(err.into());
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        let conn = self.finish()?;
        conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        match conn.execute_batch("ROLLBACK;") {
            Ok(()) => info!("event=tx_rollback module=db status=ok reason=dropped"),
            Err(err) => warn!(
                "event=tx_rollback module=db status=error reason=dropped error={}",
                err
            ),
        }
    }
}

/// Extracts the character limit from a declared column type.
///
/// Returns `None` for types without a length, e.g. `TEXT` or `INTEGER`.
pub fn parse_max_length(declared_type: &str) -> Option<u32> {
    CHAR_LENGTH_RE
        .captures(declared_type)
        .and_then(|captures| captures.get(1))
        .and_then(|length| length.as_str().parse().ok())
}

fn load_table_info(conn: &Connection, table: &str) -> DbResult<TableSchema> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value
         FROM pragma_table_info(?1)
         ORDER BY cid;",
    )?;
    let mut rows = stmt.query([table])?;
    let mut schema = TableSchema::new();

    while let Some(row) = rows.next()? {
        let name: String = row.get("name")?;
        let declared_type: Option<String> = row.get("type")?;
        let not_null: i64 = row.get("notnull")?;
        let has_default = !matches!(row.get_ref("dflt_value")?, ValueRef::Null);

        schema.insert(
            name,
            ColumnInfo {
                nullable: not_null == 0,
                has_default,
                max_length: declared_type.as_deref().and_then(parse_max_length),
            },
        );
    }

    Ok(schema)
}

fn query_records(conn: &Connection, sql: &str, params: &[&Value]) -> DbResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let columns = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_record_row(row, &columns)?);
    }

    Ok(records)
}

/// Maps `column` onto a real result column of `table`.
///
/// SQLite reads an unknown double-quoted identifier as a string literal,
/// so a filter on a misspelled column must be rejected up front.
fn resolve_column(conn: &Connection, quoted_table: &str, column: &str) -> DbResult<String> {
    let stmt = conn.prepare(&format!("SELECT * FROM {quoted_table};"))?;
    let resolved = stmt
        .column_names()
        .into_iter()
        .find(|name| name.eq_ignore_ascii_case(column))
        .map(str::to_string);
    resolved.ok_or_else(|| DbError::InvalidIdentifier(column.to_string()))
}

fn parse_record_row(row: &Row<'_>, columns: &[String]) -> DbResult<Record> {
    let mut record = Record::new();
    for (index, column) in columns.iter().enumerate() {
        let value = match row.get_ref(index)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(value) => Value::Integer(value),
            ValueRef::Real(value) => Value::Real(value),
            ValueRef::Text(bytes) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|_| {
                        DbError::InvalidData(format!("non UTF-8 text in column `{column}`"))
                    })?
                    .to_string(),
            ),
            ValueRef::Blob(_) => {
                return Err(DbError::InvalidData(format!(
                    "blob value in column `{column}` is not supported"
                )));
            }
        };
        record.set(column.as_str(), value);
    }
    Ok(record)
}

fn insert_record(conn: &Connection, table: &str, record: &Record) -> DbResult<Vec<RecordId>> {
    let table = quote_identifier(table)?;
    let sql = if record.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES;")
    } else {
        let columns = record
            .columns()
            .map(quote_identifier)
            .collect::<DbResult<Vec<_>>>()?
            .join(", ");
        let placeholders = (1..=record.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {table} ({columns}) VALUES ({placeholders});")
    };

    conn.execute(&sql, params_from_iter(record.values()))?;
    Ok(vec![conn.last_insert_rowid()])
}

fn quote_identifier(name: &str) -> DbResult<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(DbError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Bool(value) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*value))),
            Self::Integer(value) => ToSqlOutput::Owned(SqlValue::Integer(*value)),
            Self::Real(value) => ToSqlOutput::Owned(SqlValue::Real(*value)),
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Self::Timestamp(value) => ToSqlOutput::Owned(SqlValue::Text(
                value.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
        })
    }
}
