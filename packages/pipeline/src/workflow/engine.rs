// ABOUTME: Validates and applies request transitions
// ABOUTME: Role gate, source-status gate, preconditions, side effects, event emission

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use leadflow_core::AuthUser;

use crate::error::{PipelineError, PipelineResult};
use crate::storage::requests::{ProjectSeed, TransitionWrite};
use crate::storage::{LeadStorage, RequestStorage};
use crate::types::{ChangelogEntry, Project, Request, RequestStatus};

use super::events::TransitionEvent;
use super::locks::RequestLocks;
use super::transitions::{legacy_lead_status, TransitionOp};

/// Caller-supplied parameters accompanying a transition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionParams {
    /// Required by `approve-estimation`.
    pub estimate_id: Option<String>,
    /// Recorded by the reject operations.
    pub rejection_reason: Option<String>,
    /// Accepted by `send-to-estimation` as a same-call overview write.
    pub overview: Option<String>,
    /// Optional project name for `contract`; defaults to the request title.
    pub project_name: Option<String>,
}

/// What a transition produced: the updated request, and for `contract` the
/// project it created.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub request: Request,
    pub project: Option<Project>,
}

/// The single authority that changes a request's status.
pub struct TransitionEngine {
    requests: Arc<RequestStorage>,
    leads: Arc<LeadStorage>,
    locks: RequestLocks,
    events: mpsc::UnboundedSender<TransitionEvent>,
}

impl TransitionEngine {
    pub fn new(
        requests: Arc<RequestStorage>,
        leads: Arc<LeadStorage>,
        events: mpsc::UnboundedSender<TransitionEvent>,
    ) -> Self {
        Self {
            requests,
            leads,
            locks: RequestLocks::new(),
            events,
        }
    }

    /// Validate and apply one transition.
    ///
    /// The role gate runs before any state is read. Evaluation-and-apply is
    /// serialized per request id, so two concurrent calls cannot both pass
    /// validation against a stale status.
    pub async fn apply(
        &self,
        actor: &AuthUser,
        request_id: &str,
        op: TransitionOp,
        params: TransitionParams,
    ) -> PipelineResult<TransitionOutcome> {
        if actor.role != op.role() {
            return Err(PipelineError::forbidden(format!(
                "'{op}' requires role '{}', caller has role '{}'",
                op.role(),
                actor.role
            )));
        }

        let lock = self.locks.for_request(request_id);
        let _guard = lock.lock().await;

        let request = self
            .requests
            .get_request(request_id)
            .await?
            .ok_or(PipelineError::NotFound("request"))?;
        let from = request.status;

        if !op.allows_source(from) {
            return Err(PipelineError::InvalidTransition {
                op,
                current: from,
                allowed: op.allowed_sources(),
            });
        }

        let write = self.build_write(&request, op, actor, &params)?;

        let project = if op == TransitionOp::Contract {
            let seed = ProjectSeed {
                lead_id: request.lead_id.clone(),
                name: params
                    .project_name
                    .clone()
                    .unwrap_or_else(|| request.title.clone()),
                changelog: vec![ChangelogEntry::now(
                    format!("created from request '{}'", request.title),
                    &actor.id,
                )],
            };
            match self
                .requests
                .apply_contract(request_id, from, &write, seed)
                .await?
            {
                Some(project) => {
                    info!(
                        "Request {} converted to contract, project {} created",
                        request_id, project.id
                    );
                    Some(project)
                }
                None => return Err(self.stale_status(request_id, op).await),
            }
        } else {
            if !self
                .requests
                .apply_transition(request_id, from, &write)
                .await?
            {
                return Err(self.stale_status(request_id, op).await);
            }
            None
        };

        // The status write is the durable fact of record. The lead mirror is
        // a linked-entity update on the deprecated pipeline field; its
        // failure is logged, not escalated.
        if let Some(lead_status) = legacy_lead_status(write.new_status) {
            if let Err(e) = self.leads.set_status(&request.lead_id, lead_status).await {
                warn!(
                    "Failed to mirror request {} transition onto lead {}: {}",
                    request_id, request.lead_id, e
                );
            }
        }

        let updated = self
            .requests
            .get_request(request_id)
            .await?
            .ok_or(PipelineError::NotFound("request"))?;

        info!(
            "Request {} transitioned {} -> {} via '{}' by {}",
            request_id, from, updated.status, op, actor.id
        );

        let event =
            TransitionEvent::from_applied(&updated, op, from, &actor.id, &actor.name, actor.role);
        if self.events.send(event).is_err() {
            debug!("No dispatcher attached, dropping transition event");
        }

        Ok(TransitionOutcome {
            request: updated,
            project,
        })
    }

    /// Compute the full set of column values this transition commits.
    fn build_write(
        &self,
        request: &Request,
        op: TransitionOp,
        actor: &AuthUser,
        params: &TransitionParams,
    ) -> PipelineResult<TransitionWrite> {
        let mut write = TransitionWrite {
            new_status: op.target(),
            estimate_id: request.estimate_id.clone(),
            rejection_reason: request.rejection_reason.clone(),
            overview: request.overview.clone(),
            assigned_presale: request.assigned_presale.clone(),
            assigned_techlead: request.assigned_techlead.clone(),
            changelog: request.changelog.clone(),
        };

        match op {
            TransitionOp::SendToReview => {
                // Resubmission starts a clean review round.
                write.rejection_reason = None;
            }
            TransitionOp::StartReview => {
                if write.assigned_presale.is_none() {
                    write.assigned_presale = Some(actor.id.clone());
                }
            }
            TransitionOp::SendToEstimation => {
                if let Some(overview) = &params.overview {
                    write.overview = Some(overview.clone());
                }
                let has_overview = write
                    .overview
                    .as_deref()
                    .map(|o| !o.trim().is_empty())
                    .unwrap_or(false);
                if !has_overview {
                    return Err(PipelineError::validation("overview", "overview required"));
                }
            }
            TransitionOp::ApproveEstimation => {
                let estimate_id = params
                    .estimate_id
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .ok_or_else(|| {
                        PipelineError::validation("estimateId", "estimate required")
                    })?;
                // Latest wins: any previously attached estimate is replaced.
                write.estimate_id = Some(estimate_id);
                write.assigned_techlead = Some(actor.id.clone());
            }
            TransitionOp::PresaleReject | TransitionOp::SaleReject | TransitionOp::Reject => {
                if let Some(reason) = &params.rejection_reason {
                    write.rejection_reason = Some(reason.clone());
                }
            }
            TransitionOp::PresaleApprove
            | TransitionOp::PresaleRejectEstimate
            | TransitionOp::SaleAccept
            | TransitionOp::SaleRequestEdit
            | TransitionOp::Contract => {}
        }

        write.changelog.push(ChangelogEntry::now(
            format!("{}: {} -> {}", op, request.status, op.target()),
            &actor.id,
        ));

        Ok(write)
    }

    /// The guarded write missed: the row moved between validation and apply
    /// despite the lock (e.g. an out-of-band writer). Report against the
    /// status that is actually there now.
    async fn stale_status(&self, request_id: &str, op: TransitionOp) -> PipelineError {
        match self.requests.get_request(request_id).await {
            Ok(Some(request)) => PipelineError::InvalidTransition {
                op,
                current: request.status,
                allowed: op.allowed_sources(),
            },
            Ok(None) => PipelineError::NotFound("request"),
            Err(e) => PipelineError::Storage(e),
        }
    }
}
