use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::db::AppState;

pub mod estimate_requests_handlers;
pub mod estimates_handlers;
pub mod leads_handlers;
pub mod projects_handlers;
pub mod requests_handlers;
pub mod response;

/// Creates the leads API router
pub fn create_leads_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(leads_handlers::list_leads))
        .route("/", post(leads_handlers::create_lead))
        .route("/{id}", get(leads_handlers::get_lead))
        .route("/{id}", put(leads_handlers::update_lead))
        .route("/{id}", delete(leads_handlers::delete_lead))
        .with_state(state)
}

/// Creates the requests API router, including the transition routes
pub fn create_requests_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(requests_handlers::list_requests))
        .route("/", post(requests_handlers::create_request))
        .route("/{id}", get(requests_handlers::get_request))
        .route("/{id}", put(requests_handlers::update_request))
        .route("/{id}", delete(requests_handlers::delete_request))
        .route(
            "/{id}/transitions/{op}",
            post(requests_handlers::apply_transition),
        )
        .with_state(state)
}

/// Creates the estimates API router (authenticated part)
pub fn create_estimates_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(estimates_handlers::list_estimates))
        .route("/", post(estimates_handlers::create_estimate))
        .route("/{id}", get(estimates_handlers::get_estimate))
        .route("/{id}", put(estimates_handlers::update_estimate))
        .route("/{id}", delete(estimates_handlers::delete_estimate))
        .route("/{id}/share", post(estimates_handlers::share_estimate))
        .with_state(state)
}

/// Creates the public shared-estimates router; mounted outside the auth layer
pub fn create_shared_estimates_router(state: AppState) -> Router {
    Router::new()
        .route("/{token}", get(estimates_handlers::get_shared_estimate))
        .with_state(state)
}

/// Creates the projects API router
pub fn create_projects_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(projects_handlers::list_projects))
        .route("/{id}", get(projects_handlers::get_project))
        .route("/{id}", put(projects_handlers::update_project))
        .route("/{id}", delete(projects_handlers::delete_project))
        .with_state(state)
}

/// Creates the estimate-requests API router
pub fn create_estimate_requests_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(estimate_requests_handlers::list_estimate_requests))
        .route("/", post(estimate_requests_handlers::create_estimate_request))
        .route("/{id}", get(estimate_requests_handlers::get_estimate_request))
        .route("/{id}/status", put(estimate_requests_handlers::update_status))
        .route("/{id}/estimate", post(estimate_requests_handlers::attach_estimate))
        .route(
            "/{id}/cancel",
            post(estimate_requests_handlers::cancel_estimate_request),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::types::RequestStatus;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::Extension;
    use http_body_util::BodyExt;
    use leadflow_core::UserRole;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn transition_route_moves_request_to_pending_review() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let lead = seed_lead(&pool, &sale.id).await;
        let request = seed_request(&pool, &lead.id, &sale.id).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let state = AppState::new(pool, tx);
        let app = create_requests_router(state).layer(Extension(auth(&sale)));

        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(format!("/{}/transitions/send-to-review", request.id))
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(
            parsed["data"]["request"]["status"],
            RequestStatus::PendingReview.as_str()
        );
    }

    #[tokio::test]
    async fn unknown_transition_is_a_404() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let lead = seed_lead(&pool, &sale.id).await;
        let request = seed_request(&pool, &lead.id, &sale.id).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let state = AppState::new(pool, tx);
        let app = create_requests_router(state).layer(Extension(auth(&sale)));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(format!("/{}/transitions/fast-track", request.id))
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_role_transition_is_forbidden_over_http() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let pm = seed_user(&pool, "Pam Pm", UserRole::Pm).await;
        let lead = seed_lead(&pool, &sale.id).await;
        let request = seed_request(&pool, &lead.id, &sale.id).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let state = AppState::new(pool, tx);
        let app = create_requests_router(state).layer(Extension(auth(&pm)));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(format!("/{}/transitions/send-to-review", request.id))
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
