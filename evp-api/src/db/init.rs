//! Database schema initialization
//!
//! Creates all tables if missing at startup. Uniqueness and foreign-key
//! constraints mirror the invariants enforced by the API layer: one
//! enrollment per (session, contractor, cycle) and one submission per
//! (session, contractor, form, cycle).

use sqlx::SqlitePool;
use tracing::info;

use crate::error::ApiResult;

/// Create all tables if they do not exist
pub async fn init_schema(pool: &SqlitePool) -> ApiResult<()> {
    info!("Initializing database schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contractors (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            contact_person TEXT NOT NULL,
            contact_email TEXT NOT NULL,
            supervisor_name TEXT,
            supervisor_email TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL,
            created_by TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            custom_message TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            completed_at TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
            contractor_id TEXT NOT NULL REFERENCES contractors(id),
            cycle INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'pending',
            frm32_sent_at TEXT,
            frm32_completed_at TEXT,
            frm33_completed_at TEXT,
            frm34_completed_at TEXT,
            frm35_completed_at TEXT,
            final_score REAL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(session_id, contractor_id, cycle)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS form_submissions (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
            contractor_id TEXT NOT NULL REFERENCES contractors(id),
            form_id TEXT NOT NULL,
            cycle INTEGER NOT NULL DEFAULT 1,
            answers TEXT NOT NULL DEFAULT '{}',
            raw_score REAL,
            final_score REAL,
            status TEXT NOT NULL DEFAULT 'pending',
            submitted_by TEXT,
            submitted_at TEXT,
            processed_at TEXT,
            webhook_response TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(session_id, contractor_id, form_id, cycle)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_scores (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES form_submissions(id) ON DELETE CASCADE,
            question_id TEXT NOT NULL,
            question_text TEXT,
            answer_text TEXT,
            ai_score INTEGER NOT NULL CHECK (ai_score IN (0, 3, 6, 10)),
            ai_reasoning TEXT,
            weight REAL NOT NULL DEFAULT 1.0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
            contractor_id TEXT,
            recipient_email TEXT NOT NULL,
            recipient_name TEXT,
            notification_type TEXT NOT NULL,
            form_id TEXT,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            sent_at TEXT,
            error_message TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
