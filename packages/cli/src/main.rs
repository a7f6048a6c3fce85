// ABOUTME: Leadflow server entry point
// ABOUTME: Wires config, storage, the engine channel, and the dispatcher

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use leadflow_core::UserRole;
use leadflow_notify::{ConnectionRegistry, Dispatcher, NotificationStorage, NotifyState};
use leadflow_pipeline::storage::{connect_pool, schema};
use leadflow_pipeline::types::UserCreateInput;
use leadflow_pipeline::AppState;

mod app;
mod auth;
mod config;
mod telemetry;

use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = Config::from_env().inspect_err(|e| error!("Configuration error: {}", e))?;

    let pool = connect_pool(&config.database_path, 5).await?;
    schema::initialize(&pool).await?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let state = AppState::new(pool.clone(), events_tx);

    let registry = Arc::new(ConnectionRegistry::new());
    let notifications = Arc::new(NotificationStorage::new(pool));
    let notify = NotifyState {
        notifications: notifications.clone(),
        registry: registry.clone(),
    };

    let dispatcher = Arc::new(Dispatcher::new(
        state.users.clone(),
        notifications,
        registry,
    ));
    dispatcher.spawn(events_rx);

    seed_admin(&state, config.admin_token.as_deref()).await?;

    let router = app::create_app(state, notify, &config.cors_origin);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Leadflow listening on port {}", config.port);
    axum::serve(listener, router).await?;

    Ok(())
}

/// Bootstrap the first admin when the users table is empty and a token
/// was configured. Further accounts are provisioned out of band; token
/// issuance is not this server's job.
async fn seed_admin(
    state: &AppState,
    admin_token: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(token) = admin_token else {
        return Ok(());
    };

    if state.users.count_users().await? > 0 {
        return Ok(());
    }

    let admin = state
        .users
        .create_user(UserCreateInput {
            name: "Admin".to_string(),
            email: "admin@leadflow.local".to_string(),
            role: UserRole::Admin,
            api_token: Some(token.to_string()),
        })
        .await?;
    info!("Seeded initial admin user {}", admin.id);
    Ok(())
}
