//! HTTP routes over the use-case API.
//!
//! # Responsibility
//! - Decode path parameters and JSON bodies, then run one use case off the
//!   async runtime.
//! - Encode every outcome, success or failure, as a status code plus JSON body.
//!
//! # Invariants
//! - Malformed or non-JSON bodies are a 400 `invalid_request`.
//! - Unknown paths and unsupported methods are a 404 `route_not_found`.

use crate::api::{
    self, ApiContext, ApiError, ApiResult, CreateUnitPayload, DeleteNodePayload, MessageResponse,
    NodeMutationPayload, NodeMutationResponse, SweepResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::{Method, Uri};
use axum::middleware::{self, Next};
use axum::response::{Json, Response};
use axum::routing::{get, post};
use axum::Router;
use curriculum_core::{CurriculumNode, Unit, UnitSummary};
use log::{info, warn};
use std::time::Instant;

/// Builds the full router with all routes bound to `ctx`.
pub fn build_router(ctx: ApiContext) -> Router {
    Router::new()
        .route(
            "/units",
            get(list_units).post(create_unit).fallback(route_not_found),
        )
        .route(
            "/units/append-child",
            post(append_child).fallback(route_not_found),
        )
        .route(
            "/units/insert-between",
            post(insert_between).fallback(route_not_found),
        )
        .route(
            "/units/delete-node",
            post(delete_node).fallback(route_not_found),
        )
        .route("/units/:unit_id", get(get_unit).fallback(route_not_found))
        .route(
            "/units/:unit_id/nodes/:node_id",
            get(get_node).fallback(route_not_found),
        )
        .route(
            "/units/:unit_id/rebuild-summary",
            post(rebuild_summary).fallback(route_not_found),
        )
        .route(
            "/content/sweep",
            post(sweep_content).fallback(route_not_found),
        )
        .fallback(route_not_found)
        .layer(middleware::from_fn(log_request))
        .with_state(ctx)
}

async fn list_units(State(ctx): State<ApiContext>) -> ApiResult<Json<Vec<UnitSummary>>> {
    run_blocking(ctx, api::list_units).await
}

async fn create_unit(
    State(ctx): State<ApiContext>,
    body: Result<Json<CreateUnitPayload>, JsonRejection>,
) -> ApiResult<Json<Unit>> {
    let Json(payload) = body.map_err(invalid_body)?;
    run_blocking(ctx, move |ctx| api::create_unit(ctx, payload)).await
}

async fn append_child(
    State(ctx): State<ApiContext>,
    body: Result<Json<NodeMutationPayload>, JsonRejection>,
) -> ApiResult<Json<NodeMutationResponse>> {
    let Json(payload) = body.map_err(invalid_body)?;
    run_blocking(ctx, move |ctx| api::append_child(ctx, payload)).await
}

async fn insert_between(
    State(ctx): State<ApiContext>,
    body: Result<Json<NodeMutationPayload>, JsonRejection>,
) -> ApiResult<Json<NodeMutationResponse>> {
    let Json(payload) = body.map_err(invalid_body)?;
    run_blocking(ctx, move |ctx| api::insert_between(ctx, payload)).await
}

async fn delete_node(
    State(ctx): State<ApiContext>,
    body: Result<Json<DeleteNodePayload>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(payload) = body.map_err(invalid_body)?;
    run_blocking(ctx, move |ctx| api::delete_node(ctx, payload)).await
}

async fn get_unit(
    State(ctx): State<ApiContext>,
    Path(unit_id): Path<String>,
) -> ApiResult<Json<Unit>> {
    run_blocking(ctx, move |ctx| api::get_unit(ctx, &unit_id)).await
}

async fn get_node(
    State(ctx): State<ApiContext>,
    Path((unit_id, node_id)): Path<(String, String)>,
) -> ApiResult<Json<CurriculumNode>> {
    run_blocking(ctx, move |ctx| api::get_node(ctx, &unit_id, &node_id)).await
}

async fn rebuild_summary(
    State(ctx): State<ApiContext>,
    Path(unit_id): Path<String>,
) -> ApiResult<Json<UnitSummary>> {
    run_blocking(ctx, move |ctx| api::rebuild_summary(ctx, &unit_id)).await
}

async fn sweep_content(State(ctx): State<ApiContext>) -> ApiResult<Json<SweepResponse>> {
    run_blocking(ctx, api::sweep_orphaned_content).await
}

async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::route_not_found(method.as_str(), uri.path())
}

/// Runs one SQLite-backed use case on the blocking pool.
async fn run_blocking<T, F>(ctx: ApiContext, f: F) -> ApiResult<Json<T>>
where
    T: Send + 'static,
    F: FnOnce(&ApiContext) -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&ctx))
        .await
        .map_err(|err| ApiError::internal(format!("request task failed: {err}")))?
        .map(Json)
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::invalid_request(format!("malformed request body: {}", rejection.body_text()))
}

async fn log_request(request: Request, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if status.is_server_error() {
        warn!(
            "event=api_request module=api status=error method={} path={} http_status={} duration_ms={}",
            method,
            path,
            status.as_u16(),
            started_at.elapsed().as_millis()
        );
    } else {
        info!(
            "event=api_request module=api status=ok method={} path={} http_status={} duration_ms={}",
            method,
            path,
            status.as_u16(),
            started_at.elapsed().as_millis()
        );
    }
    response
}
