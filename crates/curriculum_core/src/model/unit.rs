//! Unit and unit summary records.
//!
//! # Responsibility
//! - Define the container that owns one curriculum forest.
//! - Define the lightweight summary used by listing views.
//!
//! # Invariants
//! - `Unit.version` increases by one on every successful persist.
//! - `UnitSummary.node_count` is advisory; tree shape is only read from `Unit.forest`.

use crate::model::node::Forest;
use serde::{Deserialize, Serialize};

/// Stable unit identifier.
pub type UnitId = String;

/// Top-level curriculum container holding one forest of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    pub title: String,
    pub forest: Forest,
    /// Optimistic concurrency token checked on every write.
    pub version: i64,
}

/// Denormalized aggregate record for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSummary {
    pub id: UnitId,
    pub title: String,
    /// Incrementally maintained node count. May lag behind the forest.
    pub node_count: i64,
}
