// ABOUTME: Sales pipeline domain library
// ABOUTME: Entities, SQLite storage, the role-gated transition engine, and API handlers

pub mod api;
pub mod db;
pub mod error;
pub mod manager;
pub mod storage;
pub mod types;
pub mod validator;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use db::AppState;
pub use error::{PipelineError, PipelineResult};
