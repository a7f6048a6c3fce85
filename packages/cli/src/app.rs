// ABOUTME: Router assembly for the API server
// ABOUTME: Everything under /api is authenticated except health and shared estimates

use axum::{
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json as ResponseJson},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use leadflow_notify::api::create_notifications_router;
use leadflow_notify::NotifyState;
use leadflow_pipeline::api::{
    create_estimate_requests_router, create_estimates_router, create_leads_router,
    create_projects_router, create_requests_router, create_shared_estimates_router,
};
use leadflow_pipeline::api::response::ApiResponse;
use leadflow_pipeline::AppState;

use crate::auth::require_auth;

/// Build the full application router.
pub fn create_app(state: AppState, notify: NotifyState, cors_origin: &str) -> Router {
    let authed = Router::new()
        .nest("/leads", create_leads_router(state.clone()))
        .nest("/requests", create_requests_router(state.clone()))
        .nest("/estimates", create_estimates_router(state.clone()))
        .nest("/projects", create_projects_router(state.clone()))
        .nest(
            "/estimate-requests",
            create_estimate_requests_router(state.clone()),
        )
        .nest("/notifications", create_notifications_router(notify))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .nest("/estimates/shared", create_shared_estimates_router(state))
        .route("/health", get(health));

    Router::new()
        .nest("/api", authed.merge(public))
        .layer(cors_layer(cors_origin))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, ResponseJson(ApiResponse::success("ok")))
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!("Invalid CORS origin '{}', allowing any origin", origin);
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use http_body_util::BodyExt;
    use leadflow_core::UserRole;
    use leadflow_notify::{ConnectionRegistry, NotificationStorage};
    use leadflow_pipeline::test_utils::{seed_user, test_pool};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    async fn app_over(pool: sqlx::SqlitePool) -> Router {
        let (tx, _rx) = mpsc::unbounded_channel();
        let state = AppState::new(pool.clone(), tx);
        let notify = NotifyState {
            notifications: Arc::new(NotificationStorage::new(pool)),
            registry: Arc::new(ConnectionRegistry::new()),
        };
        create_app(state, notify, "*")
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = app_over(test_pool().await).await;
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = app_over(test_pool().await).await;
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/leads")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_token_authenticates_a_seeded_user() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let app = app_over(pool).await;

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/leads")
                    .header(
                        "authorization",
                        format!("Bearer {}", sale.api_token.unwrap()),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], true);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let pool = test_pool().await;
        seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let app = app_over(pool).await;

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/leads")
                    .header("authorization", "Bearer not-a-real-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
