//! Async store driver contracts consumed by the repository layer.

use crate::db::DbResult;
use crate::model::record::Record;
use crate::model::schema::TableSchema;
use crate::model::value::Value;
use async_trait::async_trait;

/// Generated primary-key identifier.
pub type RecordId = i64;

/// Relational store capability needed by `TableRepository`.
///
/// Implementations must be shareable across tasks; every method may be
/// called concurrently.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns column metadata for `table`, empty when the table is absent.
    async fn column_info(&self, table: &str) -> DbResult<TableSchema>;

    /// Returns every row of `table`.
    async fn select_all(&self, table: &str) -> DbResult<Vec<Record>>;

    /// Returns rows of `table` where `column = term`.
    async fn select_where(&self, table: &str, column: &str, term: &Value)
        -> DbResult<Vec<Record>>;

    /// Opens a new transaction scope.
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>>;
}

/// One open transaction.
///
/// Dropping a transaction that was neither committed nor rolled back must
/// roll it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Inserts `record` and returns the generated identifiers.
    async fn insert_returning_id(&mut self, table: &str, record: &Record)
        -> DbResult<Vec<RecordId>>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;
}
