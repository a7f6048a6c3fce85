// ABOUTME: User storage layer
// ABOUTME: Lookups by id, bearer token, and role for fan-out

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use leadflow_core::{ids::generate_id, UserRole};

use super::{parse_timestamp, StorageError, StorageResult};
use crate::types::{User, UserCreateInput};

pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, input: UserCreateInput) -> StorageResult<User> {
        let id = generate_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, api_token, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(input.role.as_str())
        .bind(&input.api_token)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        debug!("Created user '{}' with ID {}", input.name, id);
        self.get_user(&id).await?.ok_or(StorageError::NotFound)
    }

    pub async fn get_user(&self, id: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    pub async fn get_user_by_token(&self, token: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE api_token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    pub async fn list_users(&self) -> StorageResult<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_user).collect()
    }

    pub async fn list_users_by_role(&self, role: UserRole) -> StorageResult<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users WHERE role = ? ORDER BY name")
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(row_to_user).collect()
    }

    pub async fn count_users(&self) -> StorageResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;
        row.try_get("n").map_err(StorageError::Sqlx)
    }
}

fn row_to_user(row: &SqliteRow) -> StorageResult<User> {
    let role_str: String = row.try_get("role")?;
    let role = role_str
        .parse::<UserRole>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role,
        api_token: row.try_get("api_token")?,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}
