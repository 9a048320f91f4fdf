//! Store driver boundary and the SQLite implementation behind it.
//!
//! # Responsibility
//! - Define the async `Store` / `StoreTransaction` driver contracts.
//! - Open and configure SQLite connections for the bundled driver.
//!
//! # Invariants
//! - Driver errors carry the underlying cause; nothing is swallowed.
//! - An unfinished transaction is rolled back when dropped.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
mod sqlite;
pub mod store;

pub use open::{open_store, open_store_in_memory};
pub use sqlite::{parse_max_length, SqliteStore, SqliteTransaction};
pub use store::{RecordId, Store, StoreTransaction};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Table or column name that cannot be quoted safely.
    InvalidIdentifier(String),
    /// Persisted or returned data that cannot be mapped to a record.
    InvalidData(String),
    /// Failure reported by a non-SQLite driver.
    Driver(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(name) => write!(f, "invalid identifier `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
            Self::Driver(message) => write!(f, "{message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidIdentifier(_) | Self::InvalidData(_) | Self::Driver(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
