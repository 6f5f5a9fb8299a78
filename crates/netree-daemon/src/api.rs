//! REST API handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use netree_core::{DeviceId, DeviceUpdate, ErrorKind, HierarchyError, NewDevice};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::AppState;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    error: String,
    kind: ErrorKind,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DuplicateId
            | ErrorKind::MultipleRoots
            | ErrorKind::CycleDetected
            | ErrorKind::RootDeletionForbidden
            | ErrorKind::DepthExceeded => StatusCode::CONFLICT,
            ErrorKind::UnknownParent | ErrorKind::InvalidField => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<HierarchyError> for ApiError {
    fn from(err: HierarchyError) -> Self {
        Self {
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        HierarchyError::invalid("body", rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(serde_json::json!({ "message": text }))).into_response()
}

fn parse_id(raw: &str) -> Result<DeviceId, ApiError> {
    raw.parse::<i64>()
        .map(DeviceId)
        .map_err(|_| HierarchyError::invalid("id", format!("'{raw}' is not an integer")).into())
}

/// Get the whole tree, nested from the root (`null` when empty)
pub async fn get_tree(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.hierarchy.list_tree())
}

/// List all devices flat, by ID
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.hierarchy.list_devices())
}

/// Get a specific device by ID
pub async fn get_device(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let device = state.hierarchy.get_device(parse_id(&id)?)?;
    Ok(Json(device).into_response())
}

/// Add a new device
pub async fn create_device(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewDevice>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let id = request.id;
    state.hierarchy.create_device(request)?;
    state.persist().await;

    info!(device = ?id, "Device added");
    Ok(message(StatusCode::CREATED, "Device added"))
}

/// Update some fields of a device, possibly moving it
pub async fn update_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<DeviceUpdate>, JsonRejection>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let Json(request) = payload?;
    state.hierarchy.update_device(id, request)?;
    state.persist().await;

    info!(device = %id, "Device updated");
    Ok(message(StatusCode::OK, "Device updated"))
}

/// Delete a device
pub async fn delete_device(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id)?;
    let removed = state.hierarchy.delete_device(id)?;
    state.persist().await;

    info!(device = %id, removed = removed.len(), "Device deleted");
    Ok(message(StatusCode::OK, "Device deleted"))
}

/// Flat DFS or BFS listing
pub async fn traverse(State(state): State<Arc<AppState>>, Path(method): Path<String>) -> ApiResult {
    let devices = state.hierarchy.traverse_named(&method)?;
    debug!(method = %method, count = devices.len(), "Traversal");
    Ok(Json(devices).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    query: String,
}

/// Search devices by ID or name
pub async fn search(State(state): State<Arc<AppState>>, Query(params): Query<SearchParams>) -> impl IntoResponse {
    let devices = state.hierarchy.search(&params.query);
    debug!(query = %params.query, count = devices.len(), "Search");
    Json(devices)
}
