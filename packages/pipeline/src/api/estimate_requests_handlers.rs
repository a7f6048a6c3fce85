// ABOUTME: HTTP request handlers for estimate-request operations
// ABOUTME: A PM's ask for an estimate against a project

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    Json,
};
use serde::Deserialize;
use tracing::{error, info};

use leadflow_core::AuthUser;

use super::response::ApiResponse;
use crate::db::AppState;
use crate::manager;
use crate::types::{EstimateRequestCreateInput, EstimateRequestStatus};

/// Query parameters for listing estimate requests
#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(rename = "projectId")]
    pub project_id: String,
}

/// List estimate requests for a project
pub async fn list_estimate_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    match state.estimate_requests.list_for_project(&query.project_id).await {
        Ok(items) => (StatusCode::OK, ResponseJson(ApiResponse::success(items))).into_response(),
        Err(e) => {
            error!("Failed to list estimate requests: {}", e);
            e.into_response()
        }
    }
}

/// Get a specific estimate request by ID
pub async fn get_estimate_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.estimate_requests.get(&id).await {
        Ok(Some(er)) => (StatusCode::OK, ResponseJson(ApiResponse::success(er))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error(
                "Estimate request not found".to_string(),
            )),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to get estimate request {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Create an estimate request (PM only)
pub async fn create_estimate_request(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(input): Json<EstimateRequestCreateInput>,
) -> impl IntoResponse {
    info!("Creating estimate request for project {}", input.project_id);

    match manager::create_estimate_request(&state, &actor, input).await {
        Ok(er) => (StatusCode::CREATED, ResponseJson(ApiResponse::success(er))).into_response(),
        Err(e) => {
            error!("Failed to create estimate request: {}", e);
            e.into_response()
        }
    }
}

/// Request body for a status update
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusUpdateRequest {
    pub status: EstimateRequestStatus,
}

/// Set the status of an estimate request
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> impl IntoResponse {
    match state.estimate_requests.set_status(&id, body.status).await {
        Ok(er) => (StatusCode::OK, ResponseJson(ApiResponse::success(er))).into_response(),
        Err(e) => {
            error!("Failed to update estimate request {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Request body for attaching an estimate
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachEstimateRequest {
    #[serde(rename = "estimateId")]
    pub estimate_id: String,
}

/// Resolve an estimate request by attaching an estimate
pub async fn attach_estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AttachEstimateRequest>,
) -> impl IntoResponse {
    match manager::attach_estimate(&state, &id, &body.estimate_id).await {
        Ok(er) => (StatusCode::OK, ResponseJson(ApiResponse::success(er))).into_response(),
        Err(e) => {
            error!("Failed to attach estimate to {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Cancel an estimate request
pub async fn cancel_estimate_request(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match manager::cancel_estimate_request(&state, &actor, &id).await {
        Ok(er) => (StatusCode::OK, ResponseJson(ApiResponse::success(er))).into_response(),
        Err(e) => {
            error!("Failed to cancel estimate request {}: {}", id, e);
            e.into_response()
        }
    }
}
