// ABOUTME: The authenticated principal handed to handlers by the auth middleware
// ABOUTME: Handlers trust this triple; credential checks happen upstream

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use serde::{Deserialize, Serialize};

use crate::roles::UserRole;

/// Verified `(user id, role, name)` triple resolved by the auth middleware
/// and stored in request extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub role: UserRole,
    pub name: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or((StatusCode::UNAUTHORIZED, "Authentication required"))
    }
}
