// ABOUTME: Events emitted by the engine after a transition commits
// ABOUTME: Carries everything the notification dispatcher needs, no re-reads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use leadflow_core::UserRole;

use crate::types::{Request, RequestStatus};

use super::TransitionOp;

/// A committed request transition. Emitted exactly once per applied
/// transition, after the durable write; consumers must treat delivery as
/// best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub request_id: String,
    pub request_title: String,
    pub lead_id: String,
    pub op: TransitionOp,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub actor_id: String,
    pub actor_name: String,
    pub actor_role: UserRole,
    pub created_by: String,
    pub assigned_presale: Option<String>,
    pub assigned_techlead: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn from_applied(
        request: &Request,
        op: TransitionOp,
        from: RequestStatus,
        actor_id: &str,
        actor_name: &str,
        actor_role: UserRole,
    ) -> Self {
        Self {
            request_id: request.id.clone(),
            request_title: request.title.clone(),
            lead_id: request.lead_id.clone(),
            op,
            from,
            to: request.status,
            actor_id: actor_id.to_string(),
            actor_name: actor_name.to_string(),
            actor_role,
            created_by: request.created_by.clone(),
            assigned_presale: request.assigned_presale.clone(),
            assigned_techlead: request.assigned_techlead.clone(),
            occurred_at: Utc::now(),
        }
    }
}
