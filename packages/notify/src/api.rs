// ABOUTME: HTTP surface for notifications: inbox CRUD and the SSE stream
// ABOUTME: The stream endpoint owns a registry guard for its whole lifetime

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
    response::{IntoResponse, Json as ResponseJson},
    routing::{delete, get, put},
    Router,
};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::error;

use leadflow_core::AuthUser;
use leadflow_pipeline::api::response::ApiResponse;

use crate::registry::{ConnectionGuard, ConnectionRegistry};
use crate::storage::NotificationStorage;
use crate::types::Notification;

/// Shared state behind the notification handlers.
#[derive(Clone)]
pub struct NotifyState {
    pub notifications: Arc<NotificationStorage>,
    pub registry: Arc<ConnectionRegistry>,
}

/// Creates the notifications API router
pub fn create_notifications_router(state: NotifyState) -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", put(mark_all_read))
        .route("/stream", get(stream_notifications))
        .route("/{id}/read", put(mark_read))
        .route("/{id}", delete(delete_notification))
        .with_state(state)
}

/// Query parameters for the inbox listing
#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread: bool,
}

/// List the authenticated user's notifications, newest first
pub async fn list_notifications(
    State(state): State<NotifyState>,
    actor: AuthUser,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    match state
        .notifications
        .list_for_user(&actor.id, query.unread)
        .await
    {
        Ok(items) => (StatusCode::OK, ResponseJson(ApiResponse::success(items))).into_response(),
        Err(e) => {
            error!("Failed to list notifications for {}: {}", actor.id, e);
            e.into_response()
        }
    }
}

/// Mark one of the user's notifications read
pub async fn mark_read(
    State(state): State<NotifyState>,
    actor: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.notifications.mark_read(&id, &actor.id).await {
        Ok(true) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success("Notification marked read")),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error(
                "Notification not found".to_string(),
            )),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to mark notification {} read: {}", id, e);
            e.into_response()
        }
    }
}

/// Mark all of the user's notifications read
pub async fn mark_all_read(
    State(state): State<NotifyState>,
    actor: AuthUser,
) -> impl IntoResponse {
    match state.notifications.mark_all_read(&actor.id).await {
        Ok(count) => (StatusCode::OK, ResponseJson(ApiResponse::success(count))).into_response(),
        Err(e) => {
            error!("Failed to mark notifications read for {}: {}", actor.id, e);
            e.into_response()
        }
    }
}

/// Delete one of the user's notifications
pub async fn delete_notification(
    State(state): State<NotifyState>,
    actor: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.notifications.delete_notification(&id, &actor.id).await {
        Ok(true) => (
            StatusCode::OK,
            ResponseJson(ApiResponse::success("Notification deleted")),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            ResponseJson(ApiResponse::<()>::error(
                "Notification not found".to_string(),
            )),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete notification {}: {}", id, e);
            e.into_response()
        }
    }
}

/// SSE stream of live notifications. Opening a second stream for the
/// same user replaces the first.
pub async fn stream_notifications(
    State(state): State<NotifyState>,
    actor: AuthUser,
) -> Sse<KeepAliveStream<NotificationStream>> {
    let (guard, rx) = state.registry.register(&actor.id);
    Sse::new(NotificationStream { _guard: guard, rx }).keep_alive(KeepAlive::default())
}

/// Yields one SSE event per pushed notification. Holds the registry
/// guard so the connection is evicted when the client goes away.
pub struct NotificationStream {
    _guard: ConnectionGuard,
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Stream for NotificationStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(notification)) => {
                let event = Event::default()
                    .event("notification")
                    .json_data(&notification)
                    .unwrap_or_else(|e| {
                        error!("Failed to encode notification: {}", e);
                        Event::default().event("notification")
                    });
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationKind;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::Extension;
    use http_body_util::BodyExt;
    use leadflow_pipeline::test_utils::{auth, seed_user, test_pool};
    use leadflow_core::UserRole;
    use tower::ServiceExt;

    async fn seeded_state(pool: &sqlx::SqlitePool) -> NotifyState {
        NotifyState {
            notifications: Arc::new(NotificationStorage::new(pool.clone())),
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    #[tokio::test]
    async fn inbox_only_shows_the_callers_rows() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;
        let state = seeded_state(&pool).await;

        state
            .notifications
            .create_notification(&sale.id, NotificationKind::StatusChange, "request", "r1", "moved")
            .await
            .unwrap();
        state
            .notifications
            .create_notification(&presale.id, NotificationKind::StatusChange, "request", "r1", "moved")
            .await
            .unwrap();

        let app = create_notifications_router(state).layer(Extension(auth(&sale)));
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let items = parsed["data"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["recipientId"], sale.id);
    }

    #[tokio::test]
    async fn marking_a_foreign_notification_read_is_a_404() {
        let pool = test_pool().await;
        let sale = seed_user(&pool, "Sara Sale", UserRole::Sale).await;
        let presale = seed_user(&pool, "Pete Presale", UserRole::PreSale).await;
        let state = seeded_state(&pool).await;

        let theirs = state
            .notifications
            .create_notification(&presale.id, NotificationKind::StatusChange, "request", "r1", "moved")
            .await
            .unwrap();

        let app = create_notifications_router(state).layer(Extension(auth(&sale)));
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("PUT")
                    .uri(format!("/{}/read", theirs.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
