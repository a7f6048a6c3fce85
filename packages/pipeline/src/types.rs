use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use leadflow_core::UserRole;

/// Status options for leads.
///
/// This is the legacy, coarse pipeline field kept for persisted data from the
/// earlier design; the engine mirrors request transitions onto it (see
/// [`crate::workflow::legacy_lead_status`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LeadStatus {
    New,
    InProgress,
    Closed,
}

impl Default for LeadStatus {
    fn default() -> Self {
        LeadStatus::New
    }
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::InProgress => "in-progress",
            LeadStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(LeadStatus::New),
            "in-progress" => Some(LeadStatus::InProgress),
            "closed" => Some(LeadStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status options for requests. Transitions between these follow the
/// directed graph enforced by [`crate::workflow::TransitionOp`] only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    New,
    PendingReview,
    Reviewing,
    Rejected,
    PendingEstimation,
    /// Produced by the earlier, simpler pipeline; kept as a valid stored
    /// status and a valid contract source for persisted data.
    Estimated,
    #[serde(rename = "presale-review")]
    PreSaleReview,
    SaleReview,
    Accepted,
    Contract,
}

impl Default for RequestStatus {
    fn default() -> Self {
        RequestStatus::New
    }
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::New => "new",
            RequestStatus::PendingReview => "pending-review",
            RequestStatus::Reviewing => "reviewing",
            RequestStatus::Rejected => "rejected",
            RequestStatus::PendingEstimation => "pending-estimation",
            RequestStatus::Estimated => "estimated",
            RequestStatus::PreSaleReview => "presale-review",
            RequestStatus::SaleReview => "sale-review",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Contract => "contract",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(RequestStatus::New),
            "pending-review" => Some(RequestStatus::PendingReview),
            "reviewing" => Some(RequestStatus::Reviewing),
            "rejected" => Some(RequestStatus::Rejected),
            "pending-estimation" => Some(RequestStatus::PendingEstimation),
            "estimated" => Some(RequestStatus::Estimated),
            "presale-review" => Some(RequestStatus::PreSaleReview),
            "sale-review" => Some(RequestStatus::SaleReview),
            "accepted" => Some(RequestStatus::Accepted),
            "contract" => Some(RequestStatus::Contract),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status options for projects, independent of the originating request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    New,
    Active,
    Paused,
    Finished,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::New
    }
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::New => "new",
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ProjectStatus::New),
            "active" => Some(ProjectStatus::Active),
            "paused" => Some(ProjectStatus::Paused),
            "finished" => Some(ProjectStatus::Finished),
            _ => None,
        }
    }
}

/// Status options for estimate requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EstimateRequestStatus {
    Pending,
    InProgress,
    PendingReview,
    ChangesRequested,
    Approved,
    Completed,
    Cancelled,
}

impl Default for EstimateRequestStatus {
    fn default() -> Self {
        EstimateRequestStatus::Pending
    }
}

impl EstimateRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateRequestStatus::Pending => "pending",
            EstimateRequestStatus::InProgress => "in-progress",
            EstimateRequestStatus::PendingReview => "pending-review",
            EstimateRequestStatus::ChangesRequested => "changes-requested",
            EstimateRequestStatus::Approved => "approved",
            EstimateRequestStatus::Completed => "completed",
            EstimateRequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EstimateRequestStatus::Pending),
            "in-progress" => Some(EstimateRequestStatus::InProgress),
            "pending-review" => Some(EstimateRequestStatus::PendingReview),
            "changes-requested" => Some(EstimateRequestStatus::ChangesRequested),
            "approved" => Some(EstimateRequestStatus::Approved),
            "completed" => Some(EstimateRequestStatus::Completed),
            "cancelled" => Some(EstimateRequestStatus::Cancelled),
            _ => None,
        }
    }
}

/// One entry in an append-only changelog (projects, requests).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangelogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
}

impl ChangelogEntry {
    pub fn now(action: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            actor: actor.into(),
        }
    }
}

/// One entry in an estimate's append-only edit history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditHistoryEntry {
    pub action: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl EditHistoryEntry {
    pub fn now(action: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            actor: actor.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// Pre-issued opaque bearer token. Token issuance itself is external.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserCreateInput {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub api_token: Option<String>,
}

/// A prospective client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub client_name: String,
    pub contact_email: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a lead
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LeadCreateInput {
    pub client_name: String,
    pub contact_email: Option<String>,
    pub source: Option<String>,
}

/// Allow-listed field updates for a lead
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LeadUpdateInput {
    pub client_name: Option<String>,
    pub contact_email: Option<String>,
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
}

/// A scoped project ask under a lead, subject to the approval pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub lead_id: String,
    pub title: String,
    pub scope_description: String,
    pub cooperation_terms: Option<String>,
    /// PreSale-authored overview; required before the request can be sent
    /// to estimation.
    pub overview: Option<String>,
    pub status: RequestStatus,
    pub priority: Priority,
    pub presale_priority: Option<Priority>,
    pub estimate_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub assigned_presale: Option<String>,
    pub assigned_techlead: Option<String>,
    pub changelog: Vec<ChangelogEntry>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestCreateInput {
    pub lead_id: String,
    pub title: String,
    pub scope_description: String,
    pub cooperation_terms: Option<String>,
    pub overview: Option<String>,
    pub priority: Option<Priority>,
    pub presale_priority: Option<Priority>,
}

/// Allow-listed field updates for a request. Status is deliberately absent:
/// status only moves through the transition engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestUpdateInput {
    pub title: Option<String>,
    pub scope_description: Option<String>,
    pub cooperation_terms: Option<String>,
    pub overview: Option<String>,
    pub priority: Option<Priority>,
    pub presale_priority: Option<Priority>,
    pub assigned_presale: Option<String>,
    pub assigned_techlead: Option<String>,
}

/// A versioned proposal/costing artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub id: String,
    pub title: String,
    /// Opaque structured content; parsed/serialized at the store boundary only.
    pub content: serde_json::Value,
    pub edit_history: Vec<EditHistoryEntry>,
    pub request_id: Option<String>,
    pub project_id: Option<String>,
    /// Public, unguessable share identifier. Immutable once assigned.
    pub share_token: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EstimateCreateInput {
    pub title: String,
    pub content: serde_json::Value,
    pub request_id: Option<String>,
    pub project_id: Option<String>,
}

/// Allow-listed field updates for an estimate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EstimateUpdateInput {
    pub title: Option<String>,
    pub content: Option<serde_json::Value>,
    pub request_id: Option<String>,
    pub project_id: Option<String>,
}

/// The post-acceptance engagement record created from a converted request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub lead_id: String,
    pub request_id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub assigned_pm: Option<String>,
    pub changelog: Vec<ChangelogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allow-listed field updates for a project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectUpdateInput {
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
    pub assigned_pm: Option<String>,
}

/// A PM's ask for an estimate against a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub id: String,
    pub project_id: String,
    pub requested_by: String,
    pub description: String,
    pub status: EstimateRequestStatus,
    pub estimate_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an estimate request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EstimateRequestCreateInput {
    pub project_id: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_status_round_trips() {
        for s in [
            RequestStatus::New,
            RequestStatus::PendingReview,
            RequestStatus::Reviewing,
            RequestStatus::Rejected,
            RequestStatus::PendingEstimation,
            RequestStatus::Estimated,
            RequestStatus::PreSaleReview,
            RequestStatus::SaleReview,
            RequestStatus::Accepted,
            RequestStatus::Contract,
        ] {
            assert_eq!(RequestStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(RequestStatus::parse("converted"), None);
    }

    #[test]
    fn update_inputs_reject_unknown_fields() {
        let err = serde_json::from_str::<RequestUpdateInput>(r#"{"status":"contract"}"#);
        assert!(err.is_err());
    }
}
