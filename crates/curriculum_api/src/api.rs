//! Use-case API for request/response callers.
//!
//! # Responsibility
//! - Accept JSON-shaped requests, run one curriculum use case, return a typed reply.
//! - Map core errors onto HTTP status codes and stable error codes.
//!
//! # Invariants
//! - Every call opens its own connection; no state survives between calls.
//! - Functions never panic; every failure is an `ApiError`.
//! - Unknown node types are request validation errors (400), not tree errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use curriculum_core::db::open_db;
use curriculum_core::{
    ContentError, CoreConfig, CurriculumNode, CurriculumService, CurriculumServiceError, Forest,
    NodeId, NodeKind, NodeMutationRequest, NodeSpec, SqliteContentRepository,
    SqliteUnitRepository, Unit, UnitRepoError, UnitSummary,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Result type for API use cases.
pub type ApiResult<T> = Result<T, ApiError>;

/// Per-call context. Holds configuration only, never a live connection.
#[derive(Debug, Clone)]
pub struct ApiContext {
    config: CoreConfig,
}

impl ApiContext {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }

    /// Context backed by `CURRICULUM_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(CoreConfig::from_env())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

/// Error envelope returned to callers as `{error, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn route_not_found(method: &str, path: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "route_not_found",
            format!("no route for {method} {path}"),
        )
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.error, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<CurriculumServiceError> for ApiError {
    fn from(value: CurriculumServiceError) -> Self {
        let message = value.to_string();
        match value {
            CurriculumServiceError::InvalidTitle | CurriculumServiceError::DuplicateNodeId(_) => {
                Self::invalid_request(message)
            }
            CurriculumServiceError::UnitNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "unit_not_found", message)
            }
            CurriculumServiceError::TargetNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "target_not_found", message)
            }
            CurriculumServiceError::NodeNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "node_not_found", message)
            }
            CurriculumServiceError::ContentCreationFailed(_) => {
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "content_creation_failed",
                    message,
                )
            }
            CurriculumServiceError::ConcurrentModification(_) => {
                Self::new(StatusCode::CONFLICT, "concurrent_modification", message)
            }
            CurriculumServiceError::Content(_) | CurriculumServiceError::Repo(_) => {
                Self::internal(message)
            }
        }
    }
}

/// `newNode` request shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewNodePayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Append-child / insert-between request shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMutationPayload {
    pub unit_id: String,
    pub target_node_id: String,
    pub new_node: NewNodePayload,
    #[serde(default)]
    pub input_sub_type: Option<String>,
}

/// Delete-node request shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNodePayload {
    pub unit_id: String,
    pub node_id: String,
}

/// Create-unit request shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateUnitPayload {
    pub title: String,
    #[serde(default)]
    pub forest: Forest,
}

/// Success shape for node-creating calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMutationResponse {
    pub message: String,
    pub new_node: CurriculumNode,
}

/// Success shape for the content sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepResponse {
    pub deleted: Vec<NodeId>,
}

/// Success shape for calls that only report an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Appends a freshly provisioned node as the target's last child.
pub fn append_child(
    ctx: &ApiContext,
    payload: NodeMutationPayload,
) -> ApiResult<NodeMutationResponse> {
    let request = to_mutation_request(payload)?;
    let new_node = with_service(ctx, |service| service.append_child(&request))?;
    Ok(NodeMutationResponse {
        message: "Child appended.".to_string(),
        new_node,
    })
}

/// Inserts a freshly provisioned node between the target and its children.
pub fn insert_between(
    ctx: &ApiContext,
    payload: NodeMutationPayload,
) -> ApiResult<NodeMutationResponse> {
    let request = to_mutation_request(payload)?;
    let new_node = with_service(ctx, |service| service.insert_between(&request))?;
    Ok(NodeMutationResponse {
        message: "Node inserted.".to_string(),
        new_node,
    })
}

/// Deletes one node and reparents its children.
pub fn delete_node(ctx: &ApiContext, payload: DeleteNodePayload) -> ApiResult<MessageResponse> {
    with_service(ctx, |service| {
        service.delete_node(&payload.unit_id, &payload.node_id)
    })?;
    Ok(MessageResponse {
        message: "Node deleted.".to_string(),
    })
}

/// Loads one unit with its full forest.
pub fn get_unit(ctx: &ApiContext, unit_id: &str) -> ApiResult<Unit> {
    with_service(ctx, |service| service.get_unit(unit_id))
}

/// Looks up one node inside one unit.
pub fn get_node(ctx: &ApiContext, unit_id: &str, node_id: &str) -> ApiResult<CurriculumNode> {
    with_service(ctx, |service| service.find_node(unit_id, node_id))
}

/// Lists unit summaries.
pub fn list_units(ctx: &ApiContext) -> ApiResult<Vec<UnitSummary>> {
    with_service(ctx, |service| service.list_units())
}

/// Creates a unit with an optional initial forest.
pub fn create_unit(ctx: &ApiContext, payload: CreateUnitPayload) -> ApiResult<Unit> {
    with_service(ctx, |service| {
        service.create_unit(payload.title, payload.forest)
    })
}

/// Recounts one unit's nodes and repairs its summary row.
pub fn rebuild_summary(ctx: &ApiContext, unit_id: &str) -> ApiResult<UnitSummary> {
    with_service(ctx, |service| {
        service.rebuild_summary(unit_id)?;
        service.get_summary(unit_id)
    })
}

/// Deletes content documents no unit references that are older than the
/// configured grace window.
pub fn sweep_orphaned_content(ctx: &ApiContext) -> ApiResult<SweepResponse> {
    let created_before_ms = sweep_cutoff_ms(SystemTime::now(), ctx.config.sweep_grace_secs)?;
    let conn = open_store(ctx)?;
    let catalog = SqliteContentRepository::try_new(&conn).map_err(content_init_error)?;
    let service = build_service(&conn)?;
    let deleted = service
        .sweep_orphaned_content(&catalog, created_before_ms)
        .map_err(ApiError::from)?;
    Ok(SweepResponse { deleted })
}

fn sweep_cutoff_ms(now: SystemTime, grace_secs: u64) -> ApiResult<i64> {
    let now_ms = now
        .duration_since(UNIX_EPOCH)
        .map_err(|err| ApiError::internal(format!("system clock before epoch: {err}")))?
        .as_millis();
    let now_ms = i64::try_from(now_ms).unwrap_or(i64::MAX);
    let grace_ms = i64::try_from(grace_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    Ok(now_ms.saturating_sub(grace_ms))
}

fn to_mutation_request(payload: NodeMutationPayload) -> ApiResult<NodeMutationRequest> {
    let kind = payload
        .new_node
        .kind
        .parse::<NodeKind>()
        .map_err(|err| ApiError::invalid_request(err.to_string()))?;
    Ok(NodeMutationRequest {
        unit_id: payload.unit_id,
        target_node_id: payload.target_node_id,
        spec: NodeSpec::new(kind, payload.new_node.title, payload.new_node.description),
        input_sub_type: payload.input_sub_type,
    })
}

fn with_service<T>(
    ctx: &ApiContext,
    f: impl FnOnce(&SqliteService<'_>) -> Result<T, CurriculumServiceError>,
) -> ApiResult<T> {
    let conn = open_store(ctx)?;
    let service = build_service(&conn)?;
    f(&service).map_err(ApiError::from)
}

type SqliteService<'conn> =
    CurriculumService<SqliteUnitRepository<'conn>, SqliteContentRepository<'conn>>;

fn open_store(ctx: &ApiContext) -> ApiResult<Connection> {
    open_db(&ctx.config.db_path)
        .map_err(|err| ApiError::internal(format!("curriculum store open failed: {err}")))
}

fn build_service(conn: &Connection) -> ApiResult<SqliteService<'_>> {
    let units = SqliteUnitRepository::try_new(conn).map_err(|err: UnitRepoError| {
        ApiError::internal(format!("unit repo init failed: {err}"))
    })?;
    let content = SqliteContentRepository::try_new(conn).map_err(content_init_error)?;
    Ok(CurriculumService::new(units, content))
}

fn content_init_error(err: ContentError) -> ApiError {
    ApiError::internal(format!("content repo init failed: {err}"))
}
