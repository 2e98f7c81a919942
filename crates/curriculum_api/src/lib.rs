//! HTTP surface over `curriculum_core`.
//!
//! Every request is stateless: it opens the configured store, runs one use
//! case, and returns either a typed reply or an `{error, message}` envelope.

pub mod api;
pub mod router;

pub use api::{ApiContext, ApiError, ApiResult};
pub use router::build_router;
