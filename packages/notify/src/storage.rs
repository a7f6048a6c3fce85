// ABOUTME: Notification storage layer
// ABOUTME: Every mutation is scoped to the recipient, never cross-user

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use leadflow_core::ids::generate_id;
use leadflow_pipeline::storage::{StorageError, StorageResult};

use crate::types::{Notification, NotificationKind};

pub struct NotificationStorage {
    pool: SqlitePool,
}

impl NotificationStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_notification(
        &self,
        recipient_id: &str,
        kind: NotificationKind,
        entity_type: &str,
        entity_id: &str,
        message: &str,
    ) -> StorageResult<Notification> {
        let id = generate_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, kind, entity_type, entity_id, message, read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&id)
        .bind(recipient_id)
        .bind(kind.as_str())
        .bind(entity_type)
        .bind(entity_id)
        .bind(message)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        debug!("Created notification {} for user {}", id, recipient_id);
        self.get_notification(&id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    pub async fn get_notification(&self, id: &str) -> StorageResult<Option<Notification>> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_notification(&r)).transpose()
    }

    /// Newest first. `unread_only` narrows to unread rows.
    pub async fn list_for_user(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> StorageResult<Vec<Notification>> {
        let sql = if unread_only {
            "SELECT * FROM notifications WHERE recipient_id = ? AND read = 0 ORDER BY created_at DESC"
        } else {
            "SELECT * FROM notifications WHERE recipient_id = ? ORDER BY created_at DESC"
        };

        let rows = sqlx::query(sql)
            .bind(recipient_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_notification).collect()
    }

    pub async fn count_unread(&self, recipient_id: &str) -> StorageResult<i64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM notifications WHERE recipient_id = ? AND read = 0")
                .bind(recipient_id)
                .fetch_one(&self.pool)
                .await
                .map_err(StorageError::Sqlx)?;
        row.try_get("n").map_err(StorageError::Sqlx)
    }

    /// Mark one notification read. Returns false when the row does not
    /// exist or belongs to another recipient.
    pub async fn mark_read(&self, id: &str, recipient_id: &str) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read = 1 WHERE id = ? AND recipient_id = ?",
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, recipient_id: &str) -> StorageResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET read = 1 WHERE recipient_id = ? AND read = 0")
                .bind(recipient_id)
                .execute(&self.pool)
                .await
                .map_err(StorageError::Sqlx)?;

        Ok(result.rows_affected())
    }

    pub async fn delete_notification(&self, id: &str, recipient_id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND recipient_id = ?")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_notification(row: &SqliteRow) -> StorageResult<Notification> {
    let kind_str: String = row.try_get("kind")?;
    let kind = NotificationKind::parse(&kind_str)
        .ok_or_else(|| StorageError::Database(format!("Unknown notification kind: {kind_str}")))?;

    let raw_created: String = row.try_get("created_at")?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&raw_created)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| StorageError::Database("Invalid created_at timestamp".to_string()))?;

    let read: i64 = row.try_get("read")?;

    Ok(Notification {
        id: row.try_get("id")?,
        recipient_id: row.try_get("recipient_id")?,
        kind,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        message: row.try_get("message")?,
        read: read != 0,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_pipeline::test_utils::test_pool;

    #[tokio::test]
    async fn unread_filter_narrows_the_list() {
        let pool = test_pool().await;
        let storage = NotificationStorage::new(pool);

        let first = storage
            .create_notification("u1", NotificationKind::StatusChange, "request", "r1", "moved")
            .await
            .unwrap();
        storage
            .create_notification("u1", NotificationKind::Mention, "estimate", "e1", "ping")
            .await
            .unwrap();

        assert!(storage.mark_read(&first.id, "u1").await.unwrap());

        let all = storage.list_for_user("u1", false).await.unwrap();
        let unread = storage.list_for_user("u1", true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].entity_id, "e1");
        assert_eq!(storage.count_unread("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mutations_are_scoped_to_the_recipient() {
        let pool = test_pool().await;
        let storage = NotificationStorage::new(pool);

        let n = storage
            .create_notification("u1", NotificationKind::StatusChange, "request", "r1", "moved")
            .await
            .unwrap();

        assert!(!storage.mark_read(&n.id, "u2").await.unwrap());
        assert!(!storage.delete_notification(&n.id, "u2").await.unwrap());
        assert!(storage.get_notification(&n.id).await.unwrap().is_some());

        assert!(storage.delete_notification(&n.id, "u1").await.unwrap());
        assert!(storage.get_notification(&n.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_all_read_touches_only_one_user() {
        let pool = test_pool().await;
        let storage = NotificationStorage::new(pool);

        for recipient in ["u1", "u1", "u2"] {
            storage
                .create_notification(
                    recipient,
                    NotificationKind::StatusChange,
                    "request",
                    "r1",
                    "moved",
                )
                .await
                .unwrap();
        }

        assert_eq!(storage.mark_all_read("u1").await.unwrap(), 2);
        assert_eq!(storage.count_unread("u1").await.unwrap(), 0);
        assert_eq!(storage.count_unread("u2").await.unwrap(), 1);
    }
}
