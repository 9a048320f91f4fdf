//! Dynamic record model shared by the store driver and repository layers.
//!
//! # Responsibility
//! - Define the scalar `Value`, the ordered `Record` and the `TableSchema`.
//! - Own record validation against introspected column metadata.
//!
//! # Invariants
//! - Records preserve caller field order.
//! - A `TableSchema` is never mutated once handed to a repository.

pub mod record;
pub mod schema;
pub mod value;
