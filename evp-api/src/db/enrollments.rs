//! Contractor enrollment queries
//!
//! One row per (session, contractor, cycle). Status and final_score are
//! written exclusively by the status derivation engine once submissions
//! exist.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use evp_common::{EnrollmentStatus, FormKind};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EnrollmentRow {
    pub id: String,
    pub session_id: String,
    pub contractor_id: String,
    pub cycle: i64,
    pub status: EnrollmentStatus,
    pub frm32_sent_at: Option<DateTime<Utc>>,
    pub frm32_completed_at: Option<DateTime<Utc>>,
    pub frm33_completed_at: Option<DateTime<Utc>>,
    pub frm34_completed_at: Option<DateTime<Utc>>,
    pub frm35_completed_at: Option<DateTime<Utc>>,
    pub final_score: Option<f64>,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert a pending enrollment; uniqueness violations on
/// (session, contractor, cycle) surface as DuplicateEnrollment.
pub async fn insert(
    conn: &mut SqliteConnection,
    session_id: &str,
    contractor_id: &str,
    cycle: i64,
) -> ApiResult<String> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO enrollments
            (id, session_id, contractor_id, cycle, status, metadata,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', '{}', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(session_id)
    .bind(contractor_id)
    .bind(cycle)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await
    .map_err(|e| {
        ApiError::from_insert(
            e,
            &format!("enrollment ({session_id}, {contractor_id}, cycle {cycle})"),
        )
    })?;
    Ok(id)
}

/// Get the enrollment for a (session, contractor, cycle) tuple
pub async fn get(
    conn: &mut SqliteConnection,
    session_id: &str,
    contractor_id: &str,
    cycle: i64,
) -> ApiResult<Option<EnrollmentRow>> {
    let row = sqlx::query_as::<_, EnrollmentRow>(
        "SELECT * FROM enrollments WHERE session_id = ? AND contractor_id = ? AND cycle = ?",
    )
    .bind(session_id)
    .bind(contractor_id)
    .bind(cycle)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// List all enrollments of a session
pub async fn list_for_session(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> ApiResult<Vec<EnrollmentRow>> {
    let rows = sqlx::query_as::<_, EnrollmentRow>(
        "SELECT * FROM enrollments WHERE session_id = ? ORDER BY created_at",
    )
    .bind(session_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Mark enrollment frm32_sent with its timestamp (session creation path)
pub async fn mark_frm32_sent(conn: &mut SqliteConnection, enrollment_id: &str) -> ApiResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE enrollments
        SET status = 'frm32_sent', frm32_sent_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(enrollment_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Write the derived status, final score, and the completion timestamp of
/// the form that triggered the recompute. Only the status derivation
/// engine calls this.
pub async fn apply_derivation(
    conn: &mut SqliteConnection,
    enrollment_id: &str,
    status: EnrollmentStatus,
    final_score: Option<f64>,
    completed_form: FormKind,
    completed_at: DateTime<Utc>,
) -> ApiResult<()> {
    let column = match completed_form {
        FormKind::Frm32 => "frm32_completed_at",
        FormKind::Frm33 => "frm33_completed_at",
        FormKind::Frm34 => "frm34_completed_at",
        FormKind::Frm35 => "frm35_completed_at",
    };

    // column name comes from the enum above, not from input
    let sql = format!(
        "UPDATE enrollments SET status = ?, final_score = ?, {column} = ?, updated_at = ? WHERE id = ?"
    );

    sqlx::query(&sql)
        .bind(status)
        .bind(final_score)
        .bind(completed_at)
        .bind(Utc::now())
        .bind(enrollment_id)
        .execute(conn)
        .await?;
    Ok(())
}
