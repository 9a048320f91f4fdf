//! Schema-driven data access for a single relational table.
//!
//! A [`TableRepository`] introspects its table once, validates insert
//! candidates against the discovered column metadata, inserts inside a
//! transaction that is rolled back on failure, and revives timestamp
//! columns on read.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use async_trait::async_trait;
pub use config::{ConfigError, LogConfig, StoreConfig};
pub use db::{
    open_store, open_store_in_memory, DbError, DbResult, RecordId, SqliteStore, Store,
    StoreTransaction,
};
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status};
pub use model::record::Record;
pub use model::schema::{ColumnInfo, TableSchema};
pub use model::value::Value;
pub use repo::table_repo::{RepoError, RepoResult, TableRepository};
pub use repo::Readiness;

/// Minimal health-check API for smoke probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
