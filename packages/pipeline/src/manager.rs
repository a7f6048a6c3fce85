// ABOUTME: Domain operations that span entities or carry ownership rules
// ABOUTME: Everything here validates first, then talks to storage

use tracing::info;

use leadflow_core::{AuthUser, UserRole};

use crate::db::AppState;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{
    EstimateRequest, EstimateRequestCreateInput, EstimateRequestStatus, Lead, LeadCreateInput,
    LeadStatus, Project, ProjectUpdateInput, Request, RequestCreateInput,
};
use crate::validator::{
    validate_estimate_request_create, validate_lead_create, validate_request_create,
};

/// Create a lead owned by the caller.
pub async fn create_lead(
    state: &AppState,
    actor: &AuthUser,
    input: LeadCreateInput,
) -> PipelineResult<Lead> {
    let errors = validate_lead_create(&input);
    if !errors.is_empty() {
        return Err(PipelineError::Validation(errors));
    }

    let lead = state.leads.create_lead(input, &actor.id).await?;
    info!("Created lead '{}' with ID {}", lead.client_name, lead.id);
    Ok(lead)
}

/// Delete a lead. Creator or admin only, and only while no requests hang off
/// it.
pub async fn delete_lead(state: &AppState, actor: &AuthUser, id: &str) -> PipelineResult<()> {
    let lead = state
        .leads
        .get_lead(id)
        .await?
        .ok_or(PipelineError::NotFound("lead"))?;

    if lead.created_by != actor.id && !actor.is_admin() {
        return Err(PipelineError::forbidden("only the creator or an admin can delete a lead"));
    }
    if state.leads.count_requests(id).await? > 0 {
        return Err(PipelineError::validation("id", "lead still has requests"));
    }

    state.leads.delete_lead(id).await?;
    info!("Deleted lead {}", id);
    Ok(())
}

/// Create a request under a lead. A first request implicitly advances a New
/// lead to InProgress.
pub async fn create_request(
    state: &AppState,
    actor: &AuthUser,
    input: RequestCreateInput,
) -> PipelineResult<Request> {
    let errors = validate_request_create(&input);
    if !errors.is_empty() {
        return Err(PipelineError::Validation(errors));
    }

    let lead = state
        .leads
        .get_lead(&input.lead_id)
        .await?
        .ok_or(PipelineError::NotFound("lead"))?;

    let request = state.requests.create_request(input, &actor.id).await?;

    if lead.status == LeadStatus::New {
        state
            .leads
            .set_status(&lead.id, LeadStatus::InProgress)
            .await?;
    }

    info!("Created request '{}' with ID {}", request.title, request.id);
    Ok(request)
}

/// Delete a request. Creator or admin only; converted requests are
/// immutable history and cannot be deleted.
pub async fn delete_request(state: &AppState, actor: &AuthUser, id: &str) -> PipelineResult<()> {
    let request = state
        .requests
        .get_request(id)
        .await?
        .ok_or(PipelineError::NotFound("request"))?;

    if request.created_by != actor.id && !actor.is_admin() {
        return Err(PipelineError::forbidden(
            "only the creator or an admin can delete a request",
        ));
    }
    if request.status == crate::types::RequestStatus::Contract {
        return Err(PipelineError::validation("id", "converted requests cannot be deleted"));
    }

    state.requests.delete_request(id).await?;
    info!("Deleted request {}", id);
    Ok(())
}

/// Update a project. Assigned PM or admin; an unassigned project may be
/// claimed by any PM through this update.
pub async fn update_project(
    state: &AppState,
    actor: &AuthUser,
    id: &str,
    updates: ProjectUpdateInput,
) -> PipelineResult<Project> {
    let project = state
        .projects
        .get_project(id)
        .await?
        .ok_or(PipelineError::NotFound("project"))?;

    let permitted = actor.is_admin()
        || project.assigned_pm.as_deref() == Some(actor.id.as_str())
        || (project.assigned_pm.is_none() && actor.role == UserRole::Pm);
    if !permitted {
        return Err(PipelineError::forbidden(
            "only the assigned PM or an admin can update a project",
        ));
    }

    let project = state.projects.update_project(id, updates, &actor.id).await?;
    info!("Updated project '{}' (ID: {})", project.name, project.id);
    Ok(project)
}

/// PM asks for an estimate against a project.
pub async fn create_estimate_request(
    state: &AppState,
    actor: &AuthUser,
    input: EstimateRequestCreateInput,
) -> PipelineResult<EstimateRequest> {
    if actor.role != UserRole::Pm && !actor.is_admin() {
        return Err(PipelineError::forbidden("only a PM can request an estimate"));
    }

    let errors = validate_estimate_request_create(&input);
    if !errors.is_empty() {
        return Err(PipelineError::Validation(errors));
    }

    state
        .projects
        .get_project(&input.project_id)
        .await?
        .ok_or(PipelineError::NotFound("project"))?;

    let er = state.estimate_requests.create(input, &actor.id).await?;
    info!("Created estimate request {} for project {}", er.id, er.project_id);
    Ok(er)
}

/// Resolve an estimate request by attaching an estimate.
pub async fn attach_estimate(
    state: &AppState,
    id: &str,
    estimate_id: &str,
) -> PipelineResult<EstimateRequest> {
    state
        .estimates
        .get_estimate(estimate_id)
        .await?
        .ok_or(PipelineError::NotFound("estimate"))?;
    state
        .estimate_requests
        .get(id)
        .await?
        .ok_or(PipelineError::NotFound("estimate request"))?;

    Ok(state.estimate_requests.attach_estimate(id, estimate_id).await?)
}

/// Cancel an estimate request. Requester or admin only.
pub async fn cancel_estimate_request(
    state: &AppState,
    actor: &AuthUser,
    id: &str,
) -> PipelineResult<EstimateRequest> {
    let er = state
        .estimate_requests
        .get(id)
        .await?
        .ok_or(PipelineError::NotFound("estimate request"))?;

    if er.requested_by != actor.id && !actor.is_admin() {
        return Err(PipelineError::forbidden(
            "only the requester or an admin can cancel an estimate request",
        ));
    }

    Ok(state
        .estimate_requests
        .set_status(id, EstimateRequestStatus::Cancelled)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::types::RequestStatus;
    use leadflow_core::UserRole;
    use tokio::sync::mpsc;

    async fn state() -> AppState {
        let pool = test_pool().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        AppState::new(pool, tx)
    }

    #[tokio::test]
    async fn first_request_advances_lead_to_in_progress() {
        let state = state().await;
        let sale = auth(&seed_user(&state.pool, "Sara Sale", UserRole::Sale).await);
        let lead = create_lead(
            &state,
            &sale,
            LeadCreateInput {
                client_name: "Acme".to_string(),
                contact_email: None,
                source: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(lead.status, LeadStatus::New);

        create_request(
            &state,
            &sale,
            RequestCreateInput {
                lead_id: lead.id.clone(),
                title: "Portal".to_string(),
                scope_description: "Customer portal".to_string(),
                cooperation_terms: None,
                overview: None,
                priority: None,
                presale_priority: None,
            },
        )
        .await
        .unwrap();

        let lead = state.leads.get_lead(&lead.id).await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::InProgress);
    }

    #[tokio::test]
    async fn request_creation_requires_scope() {
        let state = state().await;
        let sale = auth(&seed_user(&state.pool, "Sara Sale", UserRole::Sale).await);
        let lead = seed_lead(&state.pool, &sale.id).await;

        let err = create_request(
            &state,
            &sale,
            RequestCreateInput {
                lead_id: lead.id,
                title: "Portal".to_string(),
                scope_description: "".to_string(),
                cooperation_terms: None,
                overview: None,
                priority: None,
                presale_priority: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn only_creator_or_admin_deletes_request() {
        let state = state().await;
        let sale = auth(&seed_user(&state.pool, "Sara Sale", UserRole::Sale).await);
        let other = auth(&seed_user(&state.pool, "Omar Other", UserRole::Sale).await);
        let admin = auth(&seed_user(&state.pool, "Ada Admin", UserRole::Admin).await);
        let lead = seed_lead(&state.pool, &sale.id).await;
        let request = seed_request(&state.pool, &lead.id, &sale.id).await;

        let err = delete_request(&state, &other, &request.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Forbidden(_)));

        delete_request(&state, &admin, &request.id).await.unwrap();
        assert!(state.requests.get_request(&request.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn converted_request_cannot_be_deleted() {
        let state = state().await;
        let sale_user = seed_user(&state.pool, "Sara Sale", UserRole::Sale).await;
        let presale_user = seed_user(&state.pool, "Pat Presale", UserRole::PreSale).await;
        let techlead_user = seed_user(&state.pool, "Tess Techlead", UserRole::TechLead).await;
        let sale = auth(&sale_user);
        let lead = seed_lead(&state.pool, &sale.id).await;
        let request = seed_request(&state.pool, &lead.id, &sale.id).await;

        drive_to_accepted(
            &state.engine,
            &sale,
            &auth(&presale_user),
            &auth(&techlead_user),
            &request.id,
        )
        .await;
        state
            .engine
            .apply(&sale, &request.id, crate::workflow::TransitionOp::Contract, Default::default())
            .await
            .unwrap();

        let err = delete_request(&state, &sale, &request.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(
            state
                .requests
                .get_request(&request.id)
                .await
                .unwrap()
                .unwrap()
                .status,
            RequestStatus::Contract
        );
    }

    #[tokio::test]
    async fn estimate_request_is_pm_only() {
        let state = state().await;
        let sale = auth(&seed_user(&state.pool, "Sara Sale", UserRole::Sale).await);

        let err = create_estimate_request(
            &state,
            &sale,
            EstimateRequestCreateInput {
                project_id: "p1".to_string(),
                description: "re-estimate phase 2".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Forbidden(_)));
    }
}
