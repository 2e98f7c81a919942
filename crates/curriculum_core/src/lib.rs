//! Core domain logic for the curriculum tree engine.
//! This crate is the single source of truth for tree invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tree;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::node::{CurriculumNode, Forest, NodeId, NodeKind, NodeSpec, UnknownNodeKind};
pub use model::unit::{Unit, UnitId, UnitSummary};
pub use repo::content_repo::{
    ContentCatalog, ContentDocument, ContentError, ContentProvisioner, ContentRequest,
    SqliteContentRepository,
};
pub use repo::unit_repo::{SqliteUnitRepository, UnitRepoError, UnitRepoResult, UnitRepository};
pub use repo::SchemaError;
pub use service::curriculum_service::{
    CurriculumService, CurriculumServiceError, NodeMutationRequest,
};
pub use tree::{TreeError, TreeResult};

/// Minimal health-check API for integration checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
