//! Test helpers shared inside the workspace: in-memory pools and seed rows.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use leadflow_core::{AuthUser, UserRole};

use crate::storage::{schema, LeadStorage, RequestStorage, UserStorage};
use crate::types::{Lead, LeadCreateInput, Request, RequestCreateInput, User, UserCreateInput};

/// In-memory SQLite pool with the schema applied. A single connection keeps
/// every query on the same in-memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    schema::initialize(&pool).await.expect("schema");
    pool
}

pub async fn seed_user(pool: &SqlitePool, name: &str, role: UserRole) -> User {
    let slug = name.to_lowercase().replace(' ', ".");
    UserStorage::new(pool.clone())
        .create_user(UserCreateInput {
            name: name.to_string(),
            email: format!("{slug}@example.com"),
            role,
            api_token: Some(format!("token-{slug}")),
        })
        .await
        .expect("seed user")
}

pub async fn seed_lead(pool: &SqlitePool, created_by: &str) -> Lead {
    LeadStorage::new(pool.clone())
        .create_lead(
            LeadCreateInput {
                client_name: "Acme Corp".to_string(),
                contact_email: Some("it@acme.example".to_string()),
                source: Some("referral".to_string()),
            },
            created_by,
        )
        .await
        .expect("seed lead")
}

pub async fn seed_request(pool: &SqlitePool, lead_id: &str, created_by: &str) -> Request {
    RequestStorage::new(pool.clone())
        .create_request(
            RequestCreateInput {
                lead_id: lead_id.to_string(),
                title: "CRM rebuild".to_string(),
                scope_description: "Replace the legacy CRM".to_string(),
                cooperation_terms: Some("T&M".to_string()),
                overview: None,
                priority: None,
                presale_priority: None,
            },
            created_by,
        )
        .await
        .expect("seed request")
}

pub fn auth(user: &User) -> AuthUser {
    AuthUser {
        id: user.id.clone(),
        role: user.role,
        name: user.name.clone(),
    }
}

/// Walk a fresh request through the happy path up to Accepted.
pub async fn drive_to_accepted(
    engine: &crate::workflow::TransitionEngine,
    sale: &AuthUser,
    presale: &AuthUser,
    techlead: &AuthUser,
    id: &str,
) {
    use crate::workflow::{TransitionOp, TransitionParams};

    engine
        .apply(sale, id, TransitionOp::SendToReview, Default::default())
        .await
        .unwrap();
    engine
        .apply(presale, id, TransitionOp::StartReview, Default::default())
        .await
        .unwrap();
    engine
        .apply(
            presale,
            id,
            TransitionOp::SendToEstimation,
            TransitionParams {
                overview: Some("scoped".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    engine
        .apply(
            techlead,
            id,
            TransitionOp::ApproveEstimation,
            TransitionParams {
                estimate_id: Some("est-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    engine
        .apply(presale, id, TransitionOp::PresaleApprove, Default::default())
        .await
        .unwrap();
    engine
        .apply(sale, id, TransitionOp::SaleAccept, Default::default())
        .await
        .unwrap();
}
