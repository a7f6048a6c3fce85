use thiserror::Error;

use crate::storage::StorageError;
use crate::types::RequestStatus;
use crate::validator::ValidationError;
use crate::workflow::TransitionOp;

/// Business-rule and storage failures surfaced at the API boundary.
///
/// Every rejected operation maps to a distinguishable reason so callers can
/// tell "wrong role" from "wrong status" from "missing field".
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("cannot {op} a request in status '{current}': requires {allowed}")]
    InvalidTransition {
        op: TransitionOp,
        current: RequestStatus,
        allowed: &'static str,
    },
    #[error("validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Validation(vec![ValidationError::new(field, message)])
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        PipelineError::Forbidden(message.into())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
