// ABOUTME: HTTP request handlers for estimate operations
// ABOUTME: Content updates append to the edit history; share tokens are idempotent

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    Json,
};
use serde::Serialize;
use tracing::{error, info};

use leadflow_core::AuthUser;

use super::response::ApiResponse;
use crate::db::AppState;
use crate::types::{EstimateCreateInput, EstimateUpdateInput};

/// List all estimates
pub async fn list_estimates(State(state): State<AppState>) -> impl IntoResponse {
    match state.estimates.list_estimates().await {
        Ok(estimates) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(estimates))).into_response()
        }
        Err(e) => {
            error!("Failed to list estimates: {}", e);
            e.into_response()
        }
    }
}

/// Get a specific estimate by ID
pub async fn get_estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.estimates.get_estimate(&id).await {
        Ok(Some(estimate)) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(estimate))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error("Estimate not found".to_string())),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to get estimate {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Public read by share token. Mounted outside the auth layer.
pub async fn get_shared_estimate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match state.estimates.get_estimate_by_token(&token).await {
        Ok(Some(estimate)) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(estimate))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error("Estimate not found".to_string())),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to get shared estimate: {}", e);
            e.into_response()
        }
    }
}

/// Create a new estimate
pub async fn create_estimate(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(input): Json<EstimateCreateInput>,
) -> impl IntoResponse {
    info!("Creating estimate: {}", input.title);

    match state.estimates.create_estimate(input, &actor.id).await {
        Ok(estimate) => (
            StatusCode::CREATED,
            ResponseJson(ApiResponse::success(estimate)),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to create estimate: {}", e);
            e.into_response()
        }
    }
}

/// Update an estimate; appends one edit-history entry
pub async fn update_estimate(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<String>,
    Json(updates): Json<EstimateUpdateInput>,
) -> impl IntoResponse {
    match state.estimates.update_estimate(&id, updates, &actor.id).await {
        Ok(estimate) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(estimate))).into_response()
        }
        Err(e) => {
            error!("Failed to update estimate {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Response for share-token generation
#[derive(Serialize)]
pub struct ShareResponse {
    #[serde(rename = "shareToken")]
    pub share_token: String,
}

/// Generate (or return the existing) public share token
pub async fn share_estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.estimates.ensure_share_token(&id).await {
        Ok(share_token) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success(ShareResponse { share_token })),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to share estimate {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Delete an estimate
pub async fn delete_estimate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.estimates.delete_estimate(&id).await {
        Ok(()) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success("Estimate deleted successfully")),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete estimate {}: {}", id, e);
            e.into_response()
        }
    }
}
