// ABOUTME: Lead storage layer
// ABOUTME: CRUD plus the status setter used by the legacy mirror

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use leadflow_core::ids::generate_id;

use super::{parse_timestamp, StorageError, StorageResult};
use crate::types::{Lead, LeadCreateInput, LeadStatus, LeadUpdateInput};

pub struct LeadStorage {
    pool: SqlitePool,
}

impl LeadStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_lead(&self, input: LeadCreateInput, created_by: &str) -> StorageResult<Lead> {
        let id = generate_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO leads (id, client_name, contact_email, source, status, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&input.client_name)
        .bind(&input.contact_email)
        .bind(&input.source)
        .bind(LeadStatus::New.as_str())
        .bind(created_by)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        debug!("Created lead '{}' with ID {}", input.client_name, id);
        self.get_lead(&id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn get_lead(&self, id: &str) -> StorageResult<Option<Lead>> {
        let row = sqlx::query("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_lead(&r)).transpose()
    }

    pub async fn list_leads(&self) -> StorageResult<Vec<Lead>> {
        let rows = sqlx::query("SELECT * FROM leads ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_lead).collect()
    }

    pub async fn update_lead(&self, id: &str, updates: LeadUpdateInput) -> StorageResult<Lead> {
        let current = self.get_lead(id).await?.ok_or(StorageError::NotFound)?;
        let now = Utc::now();

        let client_name = updates.client_name.unwrap_or(current.client_name);
        let contact_email = updates.contact_email.or(current.contact_email);
        let source = updates.source.or(current.source);
        let status = updates.status.unwrap_or(current.status);

        sqlx::query(
            r#"
            UPDATE leads
            SET client_name = ?, contact_email = ?, source = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&client_name)
        .bind(&contact_email)
        .bind(&source)
        .bind(status.as_str())
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        self.get_lead(id).await?.ok_or(StorageError::NotFound)
    }

    /// Set the legacy pipeline status field. Used by the engine's mirror and
    /// by the implicit New -> InProgress advance on first request creation.
    pub async fn set_status(&self, id: &str, status: LeadStatus) -> StorageResult<()> {
        let result = sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    pub async fn count_requests(&self, lead_id: &str) -> StorageResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM requests WHERE lead_id = ?")
            .bind(lead_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;
        row.try_get("n").map_err(StorageError::Sqlx)
    }

    pub async fn delete_lead(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM leads WHERE id = ?")
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

fn row_to_lead(row: &SqliteRow) -> StorageResult<Lead> {
    let status_str: String = row.try_get("status")?;
    let status = LeadStatus::parse(&status_str)
        .ok_or_else(|| StorageError::Database(format!("Unknown lead status: {status_str}")))?;

    Ok(Lead {
        id: row.try_get("id")?,
        client_name: row.try_get("client_name")?,
        contact_email: row.try_get("contact_email")?,
        source: row.try_get("source")?,
        status,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}
