// ABOUTME: Project storage layer
// ABOUTME: Projects are inserted by the contract transition; this covers reads and field updates

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{parse_json, parse_timestamp, StorageError, StorageResult};
use crate::types::{ChangelogEntry, Project, ProjectStatus, ProjectUpdateInput};

pub struct ProjectStorage {
    pool: SqlitePool,
}

impl ProjectStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_project(&self, id: &str) -> StorageResult<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_project(&r)).transpose()
    }

    pub async fn get_project_by_request(&self, request_id: &str) -> StorageResult<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE request_id = ?")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_project(&r)).transpose()
    }

    pub async fn list_projects(&self) -> StorageResult<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_project).collect()
    }

    pub async fn count_projects_for_lead(&self, lead_id: &str) -> StorageResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM projects WHERE lead_id = ?")
            .bind(lead_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;
        row.try_get("n").map_err(StorageError::Sqlx)
    }

    /// Apply allow-listed field updates and append one changelog entry
    /// describing them.
    pub async fn update_project(
        &self,
        id: &str,
        updates: ProjectUpdateInput,
        actor: &str,
    ) -> StorageResult<Project> {
        let current = self.get_project(id).await?.ok_or(StorageError::NotFound)?;
        let now = Utc::now();

        let mut actions: Vec<String> = Vec::new();
        if let Some(name) = &updates.name {
            actions.push(format!("renamed to '{name}'"));
        }
        if let Some(status) = &updates.status {
            actions.push(format!("status set to {}", status.as_str()));
        }
        if let Some(pm) = &updates.assigned_pm {
            actions.push(format!("assigned to PM {pm}"));
        }

        let name = updates.name.unwrap_or(current.name);
        let status = updates.status.unwrap_or(current.status);
        let assigned_pm = updates.assigned_pm.or(current.assigned_pm);

        let mut changelog = current.changelog;
        if !actions.is_empty() {
            changelog.push(ChangelogEntry::now(actions.join(", "), actor));
        }

        sqlx::query(
            r#"
            UPDATE projects
            SET name = ?, status = ?, assigned_pm = ?, changelog = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&name)
        .bind(status.as_str())
        .bind(&assigned_pm)
        .bind(serde_json::to_string(&changelog)?)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        self.get_project(id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn delete_project(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
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

fn row_to_project(row: &SqliteRow) -> StorageResult<Project> {
    let status_str: String = row.try_get("status")?;
    let status = ProjectStatus::parse(&status_str)
        .ok_or_else(|| StorageError::Database(format!("Unknown project status: {status_str}")))?;

    Ok(Project {
        id: row.try_get("id")?,
        lead_id: row.try_get("lead_id")?,
        request_id: row.try_get("request_id")?,
        name: row.try_get("name")?,
        status,
        assigned_pm: row.try_get("assigned_pm")?,
        changelog: parse_json(row, "changelog")?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}
