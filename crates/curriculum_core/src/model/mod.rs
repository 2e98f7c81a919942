//! Curriculum domain model.
//!
//! # Responsibility
//! - Define the value types shared by tree algorithms, storage and API layers.
//!
//! # Invariants
//! - Nodes reachable from one unit forest form a tree with unique ids.
//! - Nodes are created only through append/insert and removed only through delete.

pub mod node;
pub mod unit;
