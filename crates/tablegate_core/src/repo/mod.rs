//! Repository layer over the store driver boundary.
//!
//! # Responsibility
//! - Expose the table-level data-access API (`TableRepository`).
//! - Keep driver details behind the `Store` trait.
//!
//! # Invariants
//! - Every operation awaits the readiness gate before touching the store.
//! - Writes are validated against the introspected schema first.

mod gate;
pub mod revive;
pub mod table_repo;

pub use gate::Readiness;
