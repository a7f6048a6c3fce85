// ABOUTME: The closed transition table for requests
// ABOUTME: Each operation names its acting role, legal sources, and target

use std::fmt;

use serde::{Deserialize, Serialize};

use leadflow_core::UserRole;

use crate::types::{LeadStatus, RequestStatus};

/// The fixed set of named request transitions. Not user-configurable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionOp {
    /// Sale submits (or resubmits after rejection) for presale review.
    SendToReview,
    /// PreSale picks the request up.
    StartReview,
    /// PreSale forwards to techleads; requires an overview.
    SendToEstimation,
    /// PreSale rejects during review.
    PresaleReject,
    /// TechLead supplies an estimate and forwards to presale review.
    ApproveEstimation,
    /// PreSale approves the estimate for the sale.
    PresaleApprove,
    /// PreSale sends the estimate back to techleads.
    PresaleRejectEstimate,
    /// Sale accepts the estimate.
    SaleAccept,
    /// Sale asks presale for edits.
    SaleRequestEdit,
    /// Sale rejects from sale review (the narrow reject).
    SaleReject,
    /// Sale converts into a project.
    Contract,
    /// Sale rejects from anywhere (the broad escape hatch).
    Reject,
}

impl TransitionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionOp::SendToReview => "send-to-review",
            TransitionOp::StartReview => "start-review",
            TransitionOp::SendToEstimation => "send-to-estimation",
            TransitionOp::PresaleReject => "presale-reject",
            TransitionOp::ApproveEstimation => "approve-estimation",
            TransitionOp::PresaleApprove => "presale-approve",
            TransitionOp::PresaleRejectEstimate => "presale-reject-estimate",
            TransitionOp::SaleAccept => "sale-accept",
            TransitionOp::SaleRequestEdit => "sale-request-edit",
            TransitionOp::SaleReject => "sale-reject",
            TransitionOp::Contract => "contract",
            TransitionOp::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "send-to-review" => Some(TransitionOp::SendToReview),
            "start-review" => Some(TransitionOp::StartReview),
            "send-to-estimation" => Some(TransitionOp::SendToEstimation),
            "presale-reject" => Some(TransitionOp::PresaleReject),
            "approve-estimation" => Some(TransitionOp::ApproveEstimation),
            "presale-approve" => Some(TransitionOp::PresaleApprove),
            "presale-reject-estimate" => Some(TransitionOp::PresaleRejectEstimate),
            "sale-accept" => Some(TransitionOp::SaleAccept),
            "sale-request-edit" => Some(TransitionOp::SaleRequestEdit),
            "sale-reject" => Some(TransitionOp::SaleReject),
            "contract" => Some(TransitionOp::Contract),
            "reject" => Some(TransitionOp::Reject),
            _ => None,
        }
    }

    pub const ALL: [TransitionOp; 12] = [
        TransitionOp::SendToReview,
        TransitionOp::StartReview,
        TransitionOp::SendToEstimation,
        TransitionOp::PresaleReject,
        TransitionOp::ApproveEstimation,
        TransitionOp::PresaleApprove,
        TransitionOp::PresaleRejectEstimate,
        TransitionOp::SaleAccept,
        TransitionOp::SaleRequestEdit,
        TransitionOp::SaleReject,
        TransitionOp::Contract,
        TransitionOp::Reject,
    ];

    /// The one role allowed to perform this operation.
    pub fn role(&self) -> UserRole {
        match self {
            TransitionOp::SendToReview
            | TransitionOp::SaleAccept
            | TransitionOp::SaleRequestEdit
            | TransitionOp::SaleReject
            | TransitionOp::Contract
            | TransitionOp::Reject => UserRole::Sale,
            TransitionOp::StartReview
            | TransitionOp::SendToEstimation
            | TransitionOp::PresaleReject
            | TransitionOp::PresaleApprove
            | TransitionOp::PresaleRejectEstimate => UserRole::PreSale,
            TransitionOp::ApproveEstimation => UserRole::TechLead,
        }
    }

    /// Whether `current` is a legal source status for this operation.
    pub fn allows_source(&self, current: RequestStatus) -> bool {
        match self {
            TransitionOp::SendToReview => {
                matches!(current, RequestStatus::New | RequestStatus::Rejected)
            }
            TransitionOp::StartReview => current == RequestStatus::PendingReview,
            TransitionOp::SendToEstimation | TransitionOp::PresaleReject => {
                current == RequestStatus::Reviewing
            }
            TransitionOp::ApproveEstimation => current == RequestStatus::PendingEstimation,
            TransitionOp::PresaleApprove | TransitionOp::PresaleRejectEstimate => {
                current == RequestStatus::PreSaleReview
            }
            TransitionOp::SaleAccept | TransitionOp::SaleRequestEdit | TransitionOp::SaleReject => {
                current == RequestStatus::SaleReview
            }
            TransitionOp::Contract => {
                matches!(current, RequestStatus::Accepted | RequestStatus::Estimated)
            }
            // Rejection is the pipeline's universal escape hatch, short of a
            // signed contract. Re-rejecting a rejected request is a no-op
            // we refuse instead of recording twice.
            TransitionOp::Reject => {
                !matches!(current, RequestStatus::Contract | RequestStatus::Rejected)
            }
        }
    }

    /// The status this operation moves the request into.
    pub fn target(&self) -> RequestStatus {
        match self {
            TransitionOp::SendToReview => RequestStatus::PendingReview,
            TransitionOp::StartReview => RequestStatus::Reviewing,
            TransitionOp::SendToEstimation => RequestStatus::PendingEstimation,
            TransitionOp::PresaleReject => RequestStatus::Rejected,
            TransitionOp::ApproveEstimation => RequestStatus::PreSaleReview,
            TransitionOp::PresaleApprove => RequestStatus::SaleReview,
            TransitionOp::PresaleRejectEstimate => RequestStatus::PendingEstimation,
            TransitionOp::SaleAccept => RequestStatus::Accepted,
            TransitionOp::SaleRequestEdit => RequestStatus::Reviewing,
            TransitionOp::SaleReject => RequestStatus::Rejected,
            TransitionOp::Contract => RequestStatus::Contract,
            TransitionOp::Reject => RequestStatus::Rejected,
        }
    }

    /// Human-readable description of legal sources, for error messages.
    pub fn allowed_sources(&self) -> &'static str {
        match self {
            TransitionOp::SendToReview => "'new' or 'rejected'",
            TransitionOp::StartReview => "'pending-review'",
            TransitionOp::SendToEstimation | TransitionOp::PresaleReject => "'reviewing'",
            TransitionOp::ApproveEstimation => "'pending-estimation'",
            TransitionOp::PresaleApprove | TransitionOp::PresaleRejectEstimate => {
                "'presale-review'"
            }
            TransitionOp::SaleAccept | TransitionOp::SaleRequestEdit | TransitionOp::SaleReject => {
                "'sale-review'"
            }
            TransitionOp::Contract => "'accepted' or 'estimated'",
            TransitionOp::Reject => "any status except 'contract' and 'rejected'",
        }
    }
}

impl fmt::Display for TransitionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Translate a request status into the deprecated Lead pipeline field.
///
/// The earlier design drove the whole pipeline off the Lead; persisted data
/// still carries that field, so the engine mirrors every transition through
/// this single function rather than maintaining a second state machine.
/// `None` means the lead is left untouched.
pub fn legacy_lead_status(status: RequestStatus) -> Option<LeadStatus> {
    match status {
        RequestStatus::Contract => Some(LeadStatus::Closed),
        RequestStatus::Rejected => None,
        _ => Some(LeadStatus::InProgress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_names_round_trip() {
        for op in TransitionOp::ALL {
            assert_eq!(TransitionOp::parse(op.as_str()), Some(op));
        }
        assert_eq!(TransitionOp::parse("fast-track"), None);
    }

    #[test]
    fn contract_is_only_reachable_from_accepted_or_estimated() {
        for op in TransitionOp::ALL {
            if op.target() == RequestStatus::Contract {
                for status in [
                    RequestStatus::New,
                    RequestStatus::PendingReview,
                    RequestStatus::Reviewing,
                    RequestStatus::Rejected,
                    RequestStatus::PendingEstimation,
                    RequestStatus::PreSaleReview,
                    RequestStatus::SaleReview,
                    RequestStatus::Contract,
                ] {
                    assert!(!op.allows_source(status), "{op} allows {status}");
                }
                assert!(op.allows_source(RequestStatus::Accepted));
                assert!(op.allows_source(RequestStatus::Estimated));
            }
        }
    }

    #[test]
    fn contract_is_terminal() {
        for op in TransitionOp::ALL {
            assert!(!op.allows_source(RequestStatus::Contract), "{op} escapes contract");
        }
    }

    #[test]
    fn narrow_and_broad_reject_differ() {
        // Both exist on purpose; the narrow one is gated to sale review.
        assert!(TransitionOp::SaleReject.allows_source(RequestStatus::SaleReview));
        assert!(!TransitionOp::SaleReject.allows_source(RequestStatus::Reviewing));
        assert!(TransitionOp::Reject.allows_source(RequestStatus::Reviewing));
        assert!(TransitionOp::Reject.allows_source(RequestStatus::SaleReview));
        assert!(!TransitionOp::Reject.allows_source(RequestStatus::Rejected));
    }

    #[test]
    fn legacy_mirror_closes_on_contract_only() {
        assert_eq!(legacy_lead_status(RequestStatus::Contract), Some(LeadStatus::Closed));
        assert_eq!(legacy_lead_status(RequestStatus::Rejected), None);
        assert_eq!(
            legacy_lead_status(RequestStatus::Reviewing),
            Some(LeadStatus::InProgress)
        );
    }
}
