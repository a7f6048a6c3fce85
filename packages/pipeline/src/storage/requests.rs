// ABOUTME: Request storage layer
// ABOUTME: CRUD plus the atomic, compare-and-swap status transition writes

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use leadflow_core::ids::generate_id;

use super::{parse_json, parse_timestamp, StorageError, StorageResult};
use crate::types::{
    ChangelogEntry, Priority, Project, ProjectStatus, Request, RequestCreateInput, RequestStatus,
    RequestUpdateInput,
};

/// Filter for querying requests
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub lead_id: Option<String>,
    pub status: Option<RequestStatus>,
    pub created_by: Option<String>,
}

/// Final column values written by one transition. The engine computes these
/// under the per-request lock; the write commits atomically against the
/// status the engine validated (compare-and-swap on `status`).
#[derive(Debug, Clone)]
pub struct TransitionWrite {
    pub new_status: RequestStatus,
    pub estimate_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub overview: Option<String>,
    pub assigned_presale: Option<String>,
    pub assigned_techlead: Option<String>,
    pub changelog: Vec<ChangelogEntry>,
}

/// Seed values for the project a contract transition creates.
#[derive(Debug, Clone)]
pub struct ProjectSeed {
    pub lead_id: String,
    pub name: String,
    pub changelog: Vec<ChangelogEntry>,
}

pub struct RequestStorage {
    pool: SqlitePool,
}

impl RequestStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_request(
        &self,
        input: RequestCreateInput,
        created_by: &str,
    ) -> StorageResult<Request> {
        let id = generate_id();
        let now = Utc::now();
        let changelog = vec![ChangelogEntry::now("created", created_by)];

        sqlx::query(
            r#"
            INSERT INTO requests (
                id, lead_id, title, scope_description, cooperation_terms, overview,
                status, priority, presale_priority, estimate_id, rejection_reason,
                assigned_presale, assigned_techlead, changelog, created_by,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, NULL, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&input.lead_id)
        .bind(&input.title)
        .bind(&input.scope_description)
        .bind(&input.cooperation_terms)
        .bind(&input.overview)
        .bind(RequestStatus::New.as_str())
        .bind(input.priority.unwrap_or_default().as_str())
        .bind(input.presale_priority.map(|p| p.as_str()))
        .bind(serde_json::to_string(&changelog)?)
        .bind(created_by)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        debug!("Created request '{}' with ID {}", input.title, id);
        self.get_request(&id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn get_request(&self, id: &str) -> StorageResult<Option<Request>> {
        let row = sqlx::query("SELECT * FROM requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_request(&r)).transpose()
    }

    pub async fn list_requests(&self, filter: RequestFilter) -> StorageResult<Vec<Request>> {
        let mut sql = String::from("SELECT * FROM requests WHERE 1=1");
        if filter.lead_id.is_some() {
            sql.push_str(" AND lead_id = ?");
        }
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.created_by.is_some() {
            sql.push_str(" AND created_by = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query(&sql);
        if let Some(lead_id) = &filter.lead_id {
            query = query.bind(lead_id);
        }
        if let Some(status) = &filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(created_by) = &filter.created_by {
            query = query.bind(created_by);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_request).collect()
    }

    /// Plain field updates that carry no transition logic. Status is not
    /// touchable here.
    pub async fn update_request(
        &self,
        id: &str,
        updates: RequestUpdateInput,
    ) -> StorageResult<Request> {
        let current = self.get_request(id).await?.ok_or(StorageError::NotFound)?;
        let now = Utc::now();

        let title = updates.title.unwrap_or(current.title);
        let scope_description = updates.scope_description.unwrap_or(current.scope_description);
        let cooperation_terms = updates.cooperation_terms.or(current.cooperation_terms);
        let overview = updates.overview.or(current.overview);
        let priority = updates.priority.unwrap_or(current.priority);
        let presale_priority = updates.presale_priority.or(current.presale_priority);
        let assigned_presale = updates.assigned_presale.or(current.assigned_presale);
        let assigned_techlead = updates.assigned_techlead.or(current.assigned_techlead);

        sqlx::query(
            r#"
            UPDATE requests
            SET title = ?, scope_description = ?, cooperation_terms = ?, overview = ?,
                priority = ?, presale_priority = ?, assigned_presale = ?, assigned_techlead = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(&scope_description)
        .bind(&cooperation_terms)
        .bind(&overview)
        .bind(priority.as_str())
        .bind(presale_priority.map(|p| p.as_str()))
        .bind(&assigned_presale)
        .bind(&assigned_techlead)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        self.get_request(id).await?.ok_or(StorageError::NotFound)
    }

    /// Commit one transition: status plus same-call field updates in a single
    /// UPDATE guarded by `status = expected`. Returns false when the guard
    /// missed, i.e. the row moved under us.
    pub async fn apply_transition(
        &self,
        id: &str,
        expected: RequestStatus,
        write: &TransitionWrite,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET status = ?, estimate_id = ?, rejection_reason = ?, overview = ?,
                assigned_presale = ?, assigned_techlead = ?, changelog = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(write.new_status.as_str())
        .bind(&write.estimate_id)
        .bind(&write.rejection_reason)
        .bind(&write.overview)
        .bind(&write.assigned_presale)
        .bind(&write.assigned_techlead)
        .bind(serde_json::to_string(&write.changelog)?)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    /// The contract conversion: the guarded status write and the project
    /// insert commit in one transaction, so a Contract request always has its
    /// project row. The UNIQUE constraint on projects.request_id backstops
    /// the exactly-once contract.
    pub async fn apply_contract(
        &self,
        id: &str,
        expected: RequestStatus,
        write: &TransitionWrite,
        seed: ProjectSeed,
    ) -> StorageResult<Option<Project>> {
        let now = Utc::now();
        let project_id = generate_id();
        let changelog_json = serde_json::to_string(&write.changelog)?;
        let project_changelog_json = serde_json::to_string(&seed.changelog)?;

        let mut tx = self.pool.begin().await.map_err(StorageError::Sqlx)?;

        let updated = sqlx::query(
            r#"
            UPDATE requests
            SET status = ?, estimate_id = ?, rejection_reason = ?, overview = ?,
                assigned_presale = ?, assigned_techlead = ?, changelog = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(write.new_status.as_str())
        .bind(&write.estimate_id)
        .bind(&write.rejection_reason)
        .bind(&write.overview)
        .bind(&write.assigned_presale)
        .bind(&write.assigned_techlead)
        .bind(&changelog_json)
        .bind(now.to_rfc3339())
        .bind(id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Sqlx)?;

        if updated.rows_affected() != 1 {
            tx.rollback().await.map_err(StorageError::Sqlx)?;
            return Ok(None);
        }

        sqlx::query(
            r#"
            INSERT INTO projects (id, lead_id, request_id, name, status, assigned_pm, changelog, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?)
            "#,
        )
        .bind(&project_id)
        .bind(&seed.lead_id)
        .bind(id)
        .bind(&seed.name)
        .bind(ProjectStatus::New.as_str())
        .bind(&project_changelog_json)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Sqlx)?;

        tx.commit().await.map_err(StorageError::Sqlx)?;

        Ok(Some(Project {
            id: project_id,
            lead_id: seed.lead_id,
            request_id: id.to_string(),
            name: seed.name,
            status: ProjectStatus::New,
            assigned_pm: None,
            changelog: seed.changelog,
            created_at: now,
            updated_at: now,
        }))
    }

    pub async fn delete_request(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM requests WHERE id = ?")
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

fn row_to_request(row: &SqliteRow) -> StorageResult<Request> {
    let status_str: String = row.try_get("status")?;
    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| StorageError::Database(format!("Unknown request status: {status_str}")))?;

    let priority_str: String = row.try_get("priority")?;
    let priority = Priority::parse(&priority_str)
        .ok_or_else(|| StorageError::Database(format!("Unknown priority: {priority_str}")))?;

    let presale_priority = row
        .try_get::<Option<String>, _>("presale_priority")?
        .map(|s| {
            Priority::parse(&s)
                .ok_or_else(|| StorageError::Database(format!("Unknown priority: {s}")))
        })
        .transpose()?;

    Ok(Request {
        id: row.try_get("id")?,
        lead_id: row.try_get("lead_id")?,
        title: row.try_get("title")?,
        scope_description: row.try_get("scope_description")?,
        cooperation_terms: row.try_get("cooperation_terms")?,
        overview: row.try_get("overview")?,
        status,
        priority,
        presale_priority,
        estimate_id: row.try_get("estimate_id")?,
        rejection_reason: row.try_get("rejection_reason")?,
        assigned_presale: row.try_get("assigned_presale")?,
        assigned_techlead: row.try_get("assigned_techlead")?,
        changelog: parse_json(row, "changelog")?,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}
