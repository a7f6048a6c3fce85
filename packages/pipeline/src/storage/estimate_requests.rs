// ABOUTME: Estimate request storage layer
// ABOUTME: A PM's ask for an estimate against a project

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use leadflow_core::ids::generate_id;

use super::{parse_timestamp, StorageError, StorageResult};
use crate::types::{EstimateRequest, EstimateRequestCreateInput, EstimateRequestStatus};

pub struct EstimateRequestStorage {
    pool: SqlitePool,
}

impl EstimateRequestStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        input: EstimateRequestCreateInput,
        requested_by: &str,
    ) -> StorageResult<EstimateRequest> {
        let id = generate_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO estimate_requests (id, project_id, requested_by, description, status, estimate_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&input.project_id)
        .bind(requested_by)
        .bind(&input.description)
        .bind(EstimateRequestStatus::Pending.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        debug!("Created estimate request {} for project {}", id, input.project_id);
        self.get(&id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn get(&self, id: &str) -> StorageResult<Option<EstimateRequest>> {
        let row = sqlx::query("SELECT * FROM estimate_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_estimate_request(&r)).transpose()
    }

    pub async fn list_for_project(&self, project_id: &str) -> StorageResult<Vec<EstimateRequest>> {
        let rows =
            sqlx::query("SELECT * FROM estimate_requests WHERE project_id = ? ORDER BY created_at DESC")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_estimate_request).collect()
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: EstimateRequestStatus,
    ) -> StorageResult<EstimateRequest> {
        let result = sqlx::query(
            "UPDATE estimate_requests SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get(id).await?.ok_or(StorageError::NotFound)
    }

    /// Resolve the ask by attaching an estimate.
    pub async fn attach_estimate(
        &self,
        id: &str,
        estimate_id: &str,
    ) -> StorageResult<EstimateRequest> {
        let result = sqlx::query(
            "UPDATE estimate_requests SET estimate_id = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(estimate_id)
        .bind(EstimateRequestStatus::Completed.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get(id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM estimate_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

fn row_to_estimate_request(row: &SqliteRow) -> StorageResult<EstimateRequest> {
    let status_str: String = row.try_get("status")?;
    let status = EstimateRequestStatus::parse(&status_str).ok_or_else(|| {
        StorageError::Database(format!("Unknown estimate request status: {status_str}"))
    })?;

    Ok(EstimateRequest {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        requested_by: row.try_get("requested_by")?,
        description: row.try_get("description")?,
        status,
        estimate_id: row.try_get("estimate_id")?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}
