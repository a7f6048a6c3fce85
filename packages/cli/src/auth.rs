// ABOUTME: Bearer-token authentication middleware
// ABOUTME: Resolves the token against users.api_token and injects AuthUser

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use tracing::{debug, error};

use leadflow_core::AuthUser;
use leadflow_pipeline::api::response::ApiResponse;
use leadflow_pipeline::AppState;

/// Require a valid bearer token on every request passing through.
/// Inserts [`AuthUser`] into request extensions for the handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized();
    };

    match state.users.get_user_by_token(token).await {
        Ok(Some(user)) => {
            debug!("Authenticated {} ({})", user.name, user.role);
            request.extensions_mut().insert(AuthUser {
                id: user.id,
                role: user.role,
                name: user.name,
            });
            next.run(request).await
        }
        Ok(None) => unauthorized(),
        Err(e) => {
            error!("Token lookup failed: {}", e);
            e.into_response()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        ResponseJson(ApiResponse::<()>::error(
            "Authentication required".to_string(),
        )),
    )
        .into_response()
}
