//! Schema-driven repository over a single table.
//!
//! # Responsibility
//! - Gate every operation on one-time schema introspection.
//! - Validate insert candidates before any write reaches the store.
//! - Run inserts in their own transaction and revive timestamps on reads.
//!
//! # Invariants
//! - A rejected record never touches the store.
//! - A failed insert is rolled back before its error is returned.
//! - Reads never mutate; they return an empty list rather than an error
//!   when nothing matches.

use crate::db::{DbError, RecordId, Store, StoreTransaction};
use crate::model::record::Record;
use crate::model::schema::TableSchema;
use crate::model::value::Value;
use crate::repo::gate::{Readiness, ReadinessGate};
use crate::repo::revive::revive_rows;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error surfaced to callers.
///
/// Cloneable so a failed readiness outcome can be returned to every caller.
#[derive(Debug, Clone)]
pub enum RepoError {
    /// No store handle was supplied.
    Configuration(String),
    /// Target table is missing or has no discoverable columns.
    Schema(String),
    /// Record rejected before reaching the store, one message per violation.
    Validation(Vec<String>),
    /// Store failure; on writes the transaction was rolled back first.
    Store(Arc<DbError>),
}

impl RepoError {
    /// Returns the violation list for `Validation` errors.
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            Self::Validation(violations) => Some(violations.as_slice()),
            _ => None,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Schema(message) => write!(f, "schema error: {message}"),
            Self::Validation(violations) => {
                write!(f, "validation failed: {}", violations.join("; "))
            }
            Self::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(&**err),
            Self::Configuration(_) | Self::Schema(_) | Self::Validation(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Store(Arc::new(value))
    }
}

/// Data-access layer for one table, driven by its introspected schema.
pub struct TableRepository {
    table: String,
    store: Option<Arc<dyn Store>>,
    gate: ReadinessGate,
}

impl TableRepository {
    /// Creates a repository and starts schema introspection.
    ///
    /// Passing `None` yields a repository whose every operation fails with
    /// `RepoError::Configuration`.
    pub fn new(store: Option<Arc<dyn Store>>, table: impl Into<String>) -> Self {
        let table = table.into();
        let gate = ReadinessGate::open(store.clone(), table.clone());
        Self { table, store, gate }
    }

    pub fn with_store(store: Arc<dyn Store>, table: impl Into<String>) -> Self {
        Self::new(Some(store), table)
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Current readiness state, without waiting.
    pub fn readiness(&self) -> Readiness {
        self.gate.state()
    }

    /// Waits for introspection and returns the table schema.
    pub async fn schema(&self) -> RepoResult<Arc<TableSchema>> {
        self.gate.wait().await
    }

    /// Returns the violations `insert` would report for `record`.
    ///
    /// Never touches the store beyond the one-time introspection.
    pub async fn validate(&self, record: &Record) -> RepoResult<Vec<String>> {
        let schema = self.gate.wait().await?;
        Ok(schema.validate(record))
    }

    /// Validates and inserts `record`, returning its generated identifier.
    ///
    /// # Errors
    /// - The readiness failure, when introspection failed.
    /// - `Validation` when the record violates the schema.
    /// - `Store` when the transactional insert or its commit fails; the
    ///   transaction has been rolled back by then.
    pub async fn insert(&self, record: &Record) -> RepoResult<RecordId> {
        let schema = self.gate.wait().await?;

        let violations = schema.validate(record);
        if !violations.is_empty() {
            warn!(
                "event=insert module=repo status=rejected table={} violations={}",
                self.table,
                violations.len()
            );
            return Err(RepoError::Validation(violations));
        }

        let store = self.store()?;
        let started_at = Instant::now();
        let mut tx = store.begin().await?;

        let outcome = match self.insert_in(tx.as_mut(), record).await {
            Ok(id) => tx.commit().await.map(|()| id),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(id) => {
                info!(
                    "event=insert module=repo status=ok table={} fields={} duration_ms={}",
                    self.table,
                    record.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(id)
            }
            Err(err) => {
                match tx.rollback().await {
                    Ok(()) => info!(
                        "event=tx_rollback module=repo status=ok table={}",
                        self.table
                    ),
                    Err(rollback_err) => error!(
                        "event=tx_rollback module=repo status=error table={} error={}",
                        self.table, rollback_err
                    ),
                }
                error!(
                    "event=insert module=repo status=error table={} duration_ms={} error={}",
                    self.table,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Fetches rows, filtered by `column = term` when both are given.
    ///
    /// `created_at` / `updated_at` fields come back as `Value::Timestamp`.
    pub async fn fetch_by(
        &self,
        column: Option<&str>,
        term: Option<&Value>,
    ) -> RepoResult<Vec<Record>> {
        self.gate.wait().await?;
        let store = self.store()?;
        let started_at = Instant::now();

        let rows = match (column, term) {
            (Some(column), Some(term)) => store.select_where(&self.table, column, term).await,
            _ => store.select_all(&self.table).await,
        };
        let rows = rows.and_then(revive_rows).map_err(|err| {
            error!(
                "event=fetch module=repo status=error table={} filtered={} error={}",
                self.table,
                column.is_some() && term.is_some(),
                err
            );
            RepoError::from(err)
        })?;

        info!(
            "event=fetch module=repo status=ok table={} rows={} duration_ms={}",
            self.table,
            rows.len(),
            started_at.elapsed().as_millis()
        );
        Ok(rows)
    }

    /// Fetches every row of the table.
    pub async fn fetch_all(&self) -> RepoResult<Vec<Record>> {
        self.fetch_by(None, None).await
    }

    async fn insert_in(
        &self,
        tx: &mut dyn StoreTransaction,
        record: &Record,
    ) -> Result<RecordId, DbError> {
        let ids = tx.insert_returning_id(&self.table, record).await?;
        ids.first().copied().ok_or_else(|| {
            DbError::InvalidData(format!(
                "insert into `{}` returned no identifier",
                self.table
            ))
        })
    }

    fn store(&self) -> RepoResult<&Arc<dyn Store>> {
        self.store
            .as_ref()
            .ok_or_else(|| RepoError::Configuration("no data store provided".to_string()))
    }
}
