//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented storage contracts for units and content documents.
//! - Keep SQL and JSON document details out of the service layer.
//!
//! # Invariants
//! - Unit writes are version-checked; a stale write never overwrites a newer one.
//! - Repository APIs return semantic errors (`UnitNotFound`, `VersionConflict`)
//!   in addition to transport errors.

pub mod content_repo;
mod schema;
pub mod unit_repo;

pub use schema::SchemaError;
