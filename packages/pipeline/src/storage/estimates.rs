// ABOUTME: Estimate storage layer
// ABOUTME: Content blob, append-only edit history, idempotent share token

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use leadflow_core::ids::{generate_id, generate_share_token};

use super::{parse_json, parse_timestamp, StorageError, StorageResult};
use crate::types::{EditHistoryEntry, Estimate, EstimateCreateInput, EstimateUpdateInput};

pub struct EstimateStorage {
    pool: SqlitePool,
}

impl EstimateStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_estimate(
        &self,
        input: EstimateCreateInput,
        created_by: &str,
    ) -> StorageResult<Estimate> {
        let id = generate_id();
        let now = Utc::now();
        let history = vec![EditHistoryEntry::now("created", created_by)];

        sqlx::query(
            r#"
            INSERT INTO estimates (id, title, content, edit_history, request_id, project_id, share_token, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&input.title)
        .bind(serde_json::to_string(&input.content)?)
        .bind(serde_json::to_string(&history)?)
        .bind(&input.request_id)
        .bind(&input.project_id)
        .bind(created_by)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        debug!("Created estimate '{}' with ID {}", input.title, id);
        self.get_estimate(&id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn get_estimate(&self, id: &str) -> StorageResult<Option<Estimate>> {
        let row = sqlx::query("SELECT * FROM estimates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_estimate(&r)).transpose()
    }

    pub async fn get_estimate_by_token(&self, token: &str) -> StorageResult<Option<Estimate>> {
        let row = sqlx::query("SELECT * FROM estimates WHERE share_token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_estimate(&r)).transpose()
    }

    pub async fn list_estimates(&self) -> StorageResult<Vec<Estimate>> {
        let rows = sqlx::query("SELECT * FROM estimates ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_estimate).collect()
    }

    /// Update an estimate; every applied change appends to the edit history,
    /// which never shrinks.
    pub async fn update_estimate(
        &self,
        id: &str,
        updates: EstimateUpdateInput,
        actor: &str,
    ) -> StorageResult<Estimate> {
        let current = self.get_estimate(id).await?.ok_or(StorageError::NotFound)?;
        let now = Utc::now();

        let title = updates.title.unwrap_or(current.title);
        let content_changed = updates.content.is_some();
        let content = updates.content.unwrap_or(current.content);
        let request_id = updates.request_id.or(current.request_id);
        let project_id = updates.project_id.or(current.project_id);

        let mut history = current.edit_history;
        let action = if content_changed { "content-updated" } else { "updated" };
        history.push(EditHistoryEntry::now(action, actor));

        sqlx::query(
            r#"
            UPDATE estimates
            SET title = ?, content = ?, edit_history = ?, request_id = ?, project_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(serde_json::to_string(&content)?)
        .bind(serde_json::to_string(&history)?)
        .bind(&request_id)
        .bind(&project_id)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        self.get_estimate(id).await?.ok_or(StorageError::NotFound)
    }

    /// Assign the public share token if none exists yet. First request wins;
    /// every later call returns the already-assigned token.
    pub async fn ensure_share_token(&self, id: &str) -> StorageResult<String> {
        let candidate = generate_share_token();

        sqlx::query(
            "UPDATE estimates SET share_token = ? WHERE id = ? AND share_token IS NULL",
        )
        .bind(&candidate)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        let estimate = self.get_estimate(id).await?.ok_or(StorageError::NotFound)?;
        estimate
            .share_token
            .ok_or_else(|| StorageError::Database("Share token missing after assignment".into()))
    }

    pub async fn delete_estimate(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM estimates WHERE id = ?")
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

fn row_to_estimate(row: &SqliteRow) -> StorageResult<Estimate> {
    Ok(Estimate {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: parse_json(row, "content")?,
        edit_history: parse_json(row, "edit_history")?,
        request_id: row.try_get("request_id")?,
        project_id: row.try_get("project_id")?,
        share_token: row.try_get("share_token")?,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_user, test_pool};
    use leadflow_core::UserRole;

    async fn storage() -> (EstimateStorage, String) {
        let pool = test_pool().await;
        let user = seed_user(&pool, "Dana", UserRole::TechLead).await;
        (EstimateStorage::new(pool), user.id)
    }

    #[tokio::test]
    async fn content_round_trips() {
        let (storage, user_id) = storage().await;
        let content = serde_json::json!({
            "phases": [{"name": "discovery", "days": 10}, {"name": "build", "days": 45}],
            "rate": 120.5,
            "currency": "EUR"
        });

        let estimate = storage
            .create_estimate(
                EstimateCreateInput {
                    title: "CRM rebuild".to_string(),
                    content: content.clone(),
                    request_id: None,
                    project_id: None,
                },
                &user_id,
            )
            .await
            .unwrap();

        let read_back = storage.get_estimate(&estimate.id).await.unwrap().unwrap();
        assert_eq!(read_back.content, content);
    }

    #[tokio::test]
    async fn edit_history_is_append_only() {
        let (storage, user_id) = storage().await;
        let estimate = storage
            .create_estimate(
                EstimateCreateInput {
                    title: "v1".to_string(),
                    content: serde_json::json!({"total": 1}),
                    request_id: None,
                    project_id: None,
                },
                &user_id,
            )
            .await
            .unwrap();
        assert_eq!(estimate.edit_history.len(), 1);

        let mut len = estimate.edit_history.len();
        for total in 2..5 {
            let updated = storage
                .update_estimate(
                    &estimate.id,
                    EstimateUpdateInput {
                        content: Some(serde_json::json!({ "total": total })),
                        ..Default::default()
                    },
                    &user_id,
                )
                .await
                .unwrap();
            assert!(updated.edit_history.len() > len);
            len = updated.edit_history.len();
            assert_eq!(updated.edit_history.last().unwrap().action, "content-updated");
        }
    }

    #[tokio::test]
    async fn share_token_is_idempotent() {
        let (storage, user_id) = storage().await;
        let estimate = storage
            .create_estimate(
                EstimateCreateInput {
                    title: "shared".to_string(),
                    content: serde_json::json!({}),
                    request_id: None,
                    project_id: None,
                },
                &user_id,
            )
            .await
            .unwrap();
        assert!(estimate.share_token.is_none());

        let first = storage.ensure_share_token(&estimate.id).await.unwrap();
        let second = storage.ensure_share_token(&estimate.id).await.unwrap();
        assert_eq!(first, second);

        let by_token = storage.get_estimate_by_token(&first).await.unwrap().unwrap();
        assert_eq!(by_token.id, estimate.id);
    }
}
