// ABOUTME: SQLite storage layer
// ABOUTME: Per-entity storage structs over a shared pool, enums coded as strings

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use thiserror::Error;
use tracing::debug;

pub mod estimate_requests;
pub mod estimates;
pub mod leads;
pub mod projects;
pub mod requests;
pub mod schema;
pub mod users;

pub use estimate_requests::EstimateRequestStorage;
pub use estimates::EstimateStorage;
pub use leads::LeadStorage;
pub use projects::ProjectStorage;
pub use requests::RequestStorage;
pub use users::UserStorage;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Record not found")]
    NotFound,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Open (creating if missing) the SQLite database at `path` and return a
/// configured pool. WAL, foreign keys and NORMAL synchronous match the
/// production settings; tests use [`crate::test_utils`] instead.
pub async fn connect_pool(path: &Path, max_connections: u32) -> StorageResult<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(StorageError::Sqlx)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(StorageError::Sqlx)?;

    debug!("Opened SQLite database at {}", path.display());
    Ok(pool)
}

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(row: &SqliteRow, column: &str) -> StorageResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::Database(format!("Invalid {column} timestamp")))
}

/// Parse a JSON column into a typed value.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> StorageResult<T> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(StorageError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_pool_creates_missing_directories_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("leadflow.db");

        let pool = connect_pool(&path, 1).await.unwrap();
        schema::initialize(&pool).await.unwrap();

        assert!(path.exists());
    }
}
