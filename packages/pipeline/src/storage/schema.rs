// ABOUTME: Schema bootstrap
// ABOUTME: Idempotent CREATE TABLE pass run once at startup

use sqlx::SqlitePool;
use tracing::info;

use super::{StorageError, StorageResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL,
        api_token TEXT UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS leads (
        id TEXT PRIMARY KEY,
        client_name TEXT NOT NULL,
        contact_email TEXT,
        source TEXT,
        status TEXT NOT NULL,
        created_by TEXT NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS requests (
        id TEXT PRIMARY KEY,
        lead_id TEXT NOT NULL REFERENCES leads(id),
        title TEXT NOT NULL,
        scope_description TEXT NOT NULL,
        cooperation_terms TEXT,
        overview TEXT,
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        presale_priority TEXT,
        estimate_id TEXT,
        rejection_reason TEXT,
        assigned_presale TEXT,
        assigned_techlead TEXT,
        changelog TEXT NOT NULL,
        created_by TEXT NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS estimates (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        edit_history TEXT NOT NULL,
        request_id TEXT,
        project_id TEXT,
        share_token TEXT UNIQUE,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    // request_id is UNIQUE: a request converts into at most one project.
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        lead_id TEXT NOT NULL REFERENCES leads(id),
        request_id TEXT NOT NULL UNIQUE REFERENCES requests(id),
        name TEXT NOT NULL,
        status TEXT NOT NULL,
        assigned_pm TEXT,
        changelog TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        recipient_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        message TEXT NOT NULL,
        read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS estimate_requests (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id),
        requested_by TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL,
        estimate_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_requests_lead ON requests(lead_id)",
    "CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient_id, read)",
    "CREATE INDEX IF NOT EXISTS idx_estimate_requests_project ON estimate_requests(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_users_token ON users(api_token)",
];

/// Create all tables and indexes if they do not exist yet.
pub async fn initialize(pool: &SqlitePool) -> StorageResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(StorageError::Sqlx)?;
    }
    info!("SQLite schema initialized");
    Ok(())
}
