// ABOUTME: Shared application state for API handlers
// ABOUTME: Bundles the pool, per-entity storages, and the transition engine

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::storage::{
    EstimateRequestStorage, EstimateStorage, LeadStorage, ProjectStorage, RequestStorage,
    UserStorage,
};
use crate::workflow::{TransitionEngine, TransitionEvent};

/// Shared state behind every pipeline API handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub users: Arc<UserStorage>,
    pub leads: Arc<LeadStorage>,
    pub requests: Arc<RequestStorage>,
    pub estimates: Arc<EstimateStorage>,
    pub projects: Arc<ProjectStorage>,
    pub estimate_requests: Arc<EstimateRequestStorage>,
    pub engine: Arc<TransitionEngine>,
}

impl AppState {
    /// Build the state over a connected pool. `events` feeds the
    /// notification dispatcher; the engine never blocks on it.
    pub fn new(pool: SqlitePool, events: mpsc::UnboundedSender<TransitionEvent>) -> Self {
        let leads = Arc::new(LeadStorage::new(pool.clone()));
        let requests = Arc::new(RequestStorage::new(pool.clone()));
        let engine = Arc::new(TransitionEngine::new(
            requests.clone(),
            leads.clone(),
            events,
        ));

        Self {
            users: Arc::new(UserStorage::new(pool.clone())),
            estimates: Arc::new(EstimateStorage::new(pool.clone())),
            projects: Arc::new(ProjectStorage::new(pool.clone())),
            estimate_requests: Arc::new(EstimateRequestStorage::new(pool.clone())),
            leads,
            requests,
            engine,
            pool,
        }
    }
}
