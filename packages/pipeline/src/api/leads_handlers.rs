// ABOUTME: HTTP request handlers for lead operations
// ABOUTME: Plain CRUD; status carries no transition logic on this entity

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    Json,
};
use tracing::{error, info};

use leadflow_core::AuthUser;

use super::response::ApiResponse;
use crate::db::AppState;
use crate::manager;
use crate::types::{LeadCreateInput, LeadUpdateInput};

/// List all leads
pub async fn list_leads(State(state): State<AppState>) -> impl IntoResponse {
    match state.leads.list_leads().await {
        Ok(leads) => (StatusCode::OK, ResponseJson(ApiResponse::success(leads))).into_response(),
        Err(e) => {
            error!("Failed to list leads: {}", e);
            e.into_response()
        }
    }
}

/// Get a specific lead by ID
pub async fn get_lead(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.leads.get_lead(&id).await {
        Ok(Some(lead)) => (StatusCode::OK, ResponseJson(ApiResponse::success(lead))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error("Lead not found".to_string())),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to get lead {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Create a new lead
pub async fn create_lead(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(input): Json<LeadCreateInput>,
) -> impl IntoResponse {
    info!("Creating lead: {}", input.client_name);

    match manager::create_lead(&state, &actor, input).await {
        Ok(lead) => (StatusCode::CREATED, ResponseJson(ApiResponse::success(lead))).into_response(),
        Err(e) => {
            error!("Failed to create lead: {}", e);
            e.into_response()
        }
    }
}

/// Update an existing lead
pub async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<LeadUpdateInput>,
) -> impl IntoResponse {
    match state.leads.update_lead(&id, updates).await {
        Ok(lead) => (StatusCode::OK, ResponseJson(ApiResponse::success(lead))).into_response(),
        Err(e) => {
            error!("Failed to update lead {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Delete a lead
pub async fn delete_lead(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match manager::delete_lead(&state, &actor, &id).await {
        Ok(()) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success("Lead deleted successfully")),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete lead {}: {}", id, e);
            e.into_response()
        }
    }
}
