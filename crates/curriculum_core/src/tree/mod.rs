//! Curriculum tree engine: lookup and structural mutation over a unit forest.
//!
//! # Responsibility
//! - Locate nodes by id inside arbitrarily deep, arbitrarily wide forests.
//! - Apply append, insert-between and delete-with-reparent edits in memory.
//!
//! # Invariants
//! - Not-found outcomes are values, never panics.
//! - A failed mutation leaves the forest exactly as it was.

use crate::model::node::NodeId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod locate;
pub mod mutate;

pub use locate::{
    collect_ids, count_nodes, find, find_mut, first_duplicate_id, locate, node_at, node_at_mut,
    NodePath,
};
pub use mutate::{append, delete, insert, validate_forest};

/// Result type used by tree mutations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors from tree mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Append/insert target is not in the forest.
    TargetNotFound(NodeId),
    /// Delete target is not in the forest.
    NodeNotFound(NodeId),
    /// Mutation would place the same id at two positions.
    DuplicateNodeId(NodeId),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetNotFound(id) => write!(f, "target node not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::DuplicateNodeId(id) => write!(f, "node id already present in unit: {id}"),
        }
    }
}

impl Error for TreeError {}
