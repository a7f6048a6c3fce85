// ABOUTME: HTTP request handlers for project operations
// ABOUTME: Projects are born from contract conversions; these cover reads and field updates

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    Json,
};
use tracing::error;

use leadflow_core::AuthUser;

use super::response::ApiResponse;
use crate::db::AppState;
use crate::error::PipelineError;
use crate::manager;
use crate::types::ProjectUpdateInput;

/// List all projects
pub async fn list_projects(State(state): State<AppState>) -> impl IntoResponse {
    match state.projects.list_projects().await {
        Ok(projects) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(projects))).into_response()
        }
        Err(e) => {
            error!("Failed to list projects: {}", e);
            e.into_response()
        }
    }
}

/// Get a specific project by ID
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.projects.get_project(&id).await {
        Ok(Some(project)) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(project))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error("Project not found".to_string())),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to get project {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Update a project; appends one changelog entry describing the change
pub async fn update_project(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<String>,
    Json(updates): Json<ProjectUpdateInput>,
) -> impl IntoResponse {
    match manager::update_project(&state, &actor, &id, updates).await {
        Ok(project) => {
            (StatusCode::OK, ResponseJson(ApiResponse::success(project))).into_response()
        }
        Err(e) => {
            error!("Failed to update project {}: {}", id, e);
            e.into_response()
        }
    }
}

/// Delete a project (admin only)
pub async fn delete_project(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !actor.is_admin() {
        return PipelineError::forbidden("only an admin can delete a project").into_response();
    }

    match state.projects.delete_project(&id).await {
        Ok(()) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success("Project deleted successfully")),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete project {}: {}", id, e);
            e.into_response()
        }
    }
}
