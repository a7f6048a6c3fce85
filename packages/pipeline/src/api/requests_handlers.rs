// ABOUTME: HTTP request handlers for request operations
// ABOUTME: CRUD plus the transition route that fronts the engine

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use leadflow_core::AuthUser;

use super::response::ApiResponse;
use crate::db::AppState;
use crate::manager;
use crate::storage::requests::RequestFilter;
use crate::types::{Project, Request, RequestCreateInput, RequestStatus, RequestUpdateInput};
use crate::workflow::{TransitionOp, TransitionParams};

/// Query parameters for listing requests
#[derive(Deserialize)]
pub struct ListRequestsQuery {
    #[serde(rename = "leadId")]
    pub lead_id: Option<String>,
    pub status: Option<String>,
}

/// List requests, optionally filtered by lead or status
pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref().map(RequestStatus::parse) {
        Some(None) => {
            return (
                StatusCode::BAD_REQUEST,
                ResponseJson(ApiResponse::<()>::error(format!(
                    "Unknown status: {}",
                    query.status.unwrap_or_default()
                ))),
            )
                .into_response()
        }
        Some(parsed) => parsed,
        None => None,
    };

    let filter = RequestFilter {
        lead_id: query.lead_id,
        status,
        created_by: None,
    };

    match state.requests.list_requests(filter).await {
        Ok(requests) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(requests))).into_response()
        }
        Err(e) => {
            error!("Failed to list requests: {}", e);
            e.into_response()
        }
    }
}

/// Get a specific request by ID
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.requests.get_request(&id).await {
        Ok(Some(request)) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(request))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error("Request not found".to_string())),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to get request {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Create a new request under a lead
pub async fn create_request(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(input): Json<RequestCreateInput>,
) -> impl IntoResponse {
    info!("Creating request: {}", input.title);

    match manager::create_request(&state, &actor, input).await {
        Ok(request) => (
            StatusCode::CREATED,
            ResponseJson(ApiResponse::success(request)),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to create request: {}", e);
            e.into_response()
        }
    }
}

/// Update plain fields on a request (no transition logic)
pub async fn update_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<RequestUpdateInput>,
) -> impl IntoResponse {
    match state.requests.update_request(&id, updates).await {
        Ok(request) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(request))).into_response()
        }
        Err(e) => {
            error!("Failed to update request {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Delete a request
pub async fn delete_request(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match manager::delete_request(&state, &actor, &id).await {
        Ok(()) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success("Request deleted successfully")),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete request {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Response body for an applied transition
#[derive(Serialize)]
pub struct TransitionResponse {
    pub request: Request,
    /// Present only for the contract conversion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
}

/// Apply a named transition to a request
pub async fn apply_transition(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((id, op)): Path<(String, String)>,
    params: Option<Json<TransitionParams>>,
) -> impl IntoResponse {
    let Some(op) = TransitionOp::parse(&op) else {
        return (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error(format!(
                "Unknown transition: {op}"
            ))),
        )
            .into_response();
    };

    let params = params.map(|Json(p)| p).unwrap_or_default();
    info!("Applying '{}' to request {} as {}", op, id, actor.id);

    match state.engine.apply(&actor, &id, op, params).await {
        Ok(outcome) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success(TransitionResponse {
                request: outcome.request,
                project: outcome.project,
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Transition '{}' on request {} failed: {}", op, id, e);
            e.into_response()
        }
    }
}
