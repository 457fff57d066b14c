//! Session store queries

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use evp_common::SessionStatus;

use crate::error::{ApiError, ApiResult};

/// Bound on random identifier attempts before generation is treated as a
/// fatal error
const SESSION_ID_MAX_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    /// Human-readable identifier, `sess_<6 digits>`
    pub session_id: String,
    pub tenant_id: String,
    pub created_by: String,
    pub status: SessionStatus,
    pub custom_message: Option<String>,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Per-session contractor rollup used to enrich list/detail responses
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ContractorStats {
    pub total_contractors: i64,
    pub completed_contractors: i64,
    pub average_score: Option<f64>,
}

/// Generate a unique `sess_<6 digits>` identifier, retrying random
/// suffixes against the uniqueness check up to a bounded attempt count.
pub async fn generate_session_id(conn: &mut SqliteConnection) -> ApiResult<String> {
    for _ in 0..SESSION_ID_MAX_ATTEMPTS {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
        let candidate = format!("sess_{suffix:06}");

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE session_id = ?)")
                .bind(&candidate)
                .fetch_one(&mut *conn)
                .await?;

        if !exists {
            return Ok(candidate);
        }
    }

    Err(ApiError::Internal(format!(
        "failed to generate a unique session id after {SESSION_ID_MAX_ATTEMPTS} attempts"
    )))
}

/// Insert a new active session
pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    tenant_id: &str,
    created_by: &str,
    custom_message: Option<&str>,
    metadata: &Value,
) -> ApiResult<String> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO sessions
            (id, session_id, tenant_id, created_by, status, custom_message,
             metadata, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'active', ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(session_id)
    .bind(tenant_id)
    .bind(created_by)
    .bind(custom_message)
    .bind(Json(metadata.clone()))
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(id)
}

/// Get a session by its human-readable identifier within a tenant
pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    tenant_id: &str,
) -> ApiResult<Option<SessionRow>> {
    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT * FROM sessions WHERE session_id = ? AND tenant_id = ?",
    )
    .bind(session_id)
    .bind(tenant_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Get a session by identifier regardless of tenant (webhook path, where
/// the submission row establishes scope)
pub async fn get_any(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> ApiResult<Option<SessionRow>> {
    let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE session_id = ?")
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// List sessions for a tenant, newest first
pub async fn list(
    pool: &SqlitePool,
    tenant_id: &str,
    status: Option<SessionStatus>,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<SessionRow>> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT * FROM sessions
                WHERE tenant_id = ? AND status = ?
                ORDER BY created_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(tenant_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT * FROM sessions
                WHERE tenant_id = ?
                ORDER BY created_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Update session fields; `completed_at` is stamped when the status
/// reaches completed.
pub async fn update(
    conn: &mut SqliteConnection,
    session_id: &str,
    tenant_id: &str,
    status: SessionStatus,
    custom_message: Option<&str>,
    metadata: &Value,
    completed_at: Option<DateTime<Utc>>,
) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE sessions
        SET status = ?, custom_message = ?, metadata = ?,
            completed_at = ?, updated_at = ?
        WHERE session_id = ? AND tenant_id = ?
        "#,
    )
    .bind(status)
    .bind(custom_message)
    .bind(Json(metadata.clone()))
    .bind(completed_at)
    .bind(Utc::now())
    .bind(session_id)
    .bind(tenant_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Contractor counts and average final score for one session
pub async fn contractor_stats(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> ApiResult<ContractorStats> {
    let stats = sqlx::query_as::<_, ContractorStats>(
        r#"
        SELECT
            COUNT(*) AS total_contractors,
            COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
                AS completed_contractors,
            AVG(final_score) AS average_score
        FROM enrollments
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_one(conn)
    .await?;
    Ok(stats)
}

/// All sessions of a tenant (tenant-stats rollup)
pub async fn list_all_for_tenant(
    pool: &SqlitePool,
    tenant_id: &str,
) -> ApiResult<Vec<SessionRow>> {
    let rows = sqlx::query_as::<_, SessionRow>(
        "SELECT * FROM sessions WHERE tenant_id = ? ORDER BY created_at DESC",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
