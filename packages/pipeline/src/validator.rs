// ABOUTME: Input validation for create/update payloads
// ABOUTME: Produces field-level errors the API reports as 400s

use std::fmt;

use serde::Serialize;

use crate::types::{EstimateRequestCreateInput, LeadCreateInput, RequestCreateInput};

/// A single field-level validation failure
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn require(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "is required"));
    }
}

pub fn validate_lead_create(input: &LeadCreateInput) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    require(&mut errors, "clientName", &input.client_name);
    if let Some(email) = &input.contact_email {
        if !email.contains('@') {
            errors.push(ValidationError::new("contactEmail", "is not an email"));
        }
    }
    errors
}

pub fn validate_request_create(input: &RequestCreateInput) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    require(&mut errors, "leadId", &input.lead_id);
    require(&mut errors, "title", &input.title);
    require(&mut errors, "scopeDescription", &input.scope_description);
    errors
}

pub fn validate_estimate_request_create(
    input: &EstimateRequestCreateInput,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    require(&mut errors, "projectId", &input.project_id);
    require(&mut errors, "description", &input.description);
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_requires_scope_description() {
        let input = RequestCreateInput {
            lead_id: "lead-1".to_string(),
            title: "CRM rebuild".to_string(),
            scope_description: "   ".to_string(),
            cooperation_terms: None,
            overview: None,
            priority: None,
            presale_priority: None,
        };
        let errors = validate_request_create(&input);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "scopeDescription");
    }

    #[test]
    fn lead_rejects_malformed_email() {
        let input = LeadCreateInput {
            client_name: "Acme".to_string(),
            contact_email: Some("not-an-email".to_string()),
            source: Some("referral".to_string()),
        };
        let errors = validate_lead_create(&input);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "contactEmail");
    }
}
