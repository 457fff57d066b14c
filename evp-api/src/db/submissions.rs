//! Form submission ledger queries
//!
//! One row per (session, contractor, form kind, cycle), created pending at
//! enrollment. Question scores are write-once children created by the
//! external scoring callback.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use evp_common::{FormKind, SubmissionStatus};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubmissionRow {
    pub id: String,
    pub session_id: String,
    pub contractor_id: String,
    pub form_id: FormKind,
    pub cycle: i64,
    pub answers: Json<Value>,
    pub raw_score: Option<f64>,
    pub final_score: Option<f64>,
    pub status: SubmissionStatus,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub webhook_response: Option<Json<Value>>,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct QuestionScoreRow {
    pub id: String,
    pub submission_id: String,
    pub question_id: String,
    pub question_text: Option<String>,
    pub answer_text: Option<String>,
    pub ai_score: i64,
    pub ai_reasoning: Option<String>,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing submissions; tenant scoping is applied through the
/// owning session.
#[derive(Debug, Default)]
pub struct SubmissionFilter {
    pub session_id: Option<String>,
    pub contractor_id: Option<String>,
    pub form_id: Option<FormKind>,
    pub status: Option<SubmissionStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Insert a pending submission row for one form kind
pub async fn insert_pending(
    conn: &mut SqliteConnection,
    session_id: &str,
    contractor_id: &str,
    form_id: FormKind,
    cycle: i64,
) -> ApiResult<String> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO form_submissions
            (id, session_id, contractor_id, form_id, cycle, answers, status,
             metadata, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, '{}', 'pending', '{}', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(session_id)
    .bind(contractor_id)
    .bind(form_id)
    .bind(cycle)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await
    .map_err(|e| {
        ApiError::from_insert(
            e,
            &format!("submission ({session_id}, {contractor_id}, {form_id}, cycle {cycle})"),
        )
    })?;
    Ok(id)
}

pub async fn get_by_id(
    conn: &mut SqliteConnection,
    submission_id: &str,
) -> ApiResult<Option<SubmissionRow>> {
    let row = sqlx::query_as::<_, SubmissionRow>("SELECT * FROM form_submissions WHERE id = ?")
        .bind(submission_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Get the submission for a (session, contractor, form kind, cycle) tuple
pub async fn get_by_tuple(
    conn: &mut SqliteConnection,
    session_id: &str,
    contractor_id: &str,
    form_id: FormKind,
    cycle: i64,
) -> ApiResult<Option<SubmissionRow>> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT * FROM form_submissions
        WHERE session_id = ? AND contractor_id = ? AND form_id = ? AND cycle = ?
        "#,
    )
    .bind(session_id)
    .bind(contractor_id)
    .bind(form_id)
    .bind(cycle)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// All submissions of a (session, contractor, cycle) tuple, in form order.
/// The status derivation engine re-reads this set inside its transaction.
pub async fn list_for_tuple(
    conn: &mut SqliteConnection,
    session_id: &str,
    contractor_id: &str,
    cycle: i64,
) -> ApiResult<Vec<SubmissionRow>> {
    let rows = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT * FROM form_submissions
        WHERE session_id = ? AND contractor_id = ? AND cycle = ?
        ORDER BY form_id
        "#,
    )
    .bind(session_id)
    .bind(contractor_id)
    .bind(cycle)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Tenant-scoped filtered listing, newest submissions first
pub async fn list(
    pool: &SqlitePool,
    tenant_id: &str,
    filter: &SubmissionFilter,
) -> ApiResult<Vec<SubmissionRow>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT fs.* FROM form_submissions fs
        JOIN sessions s ON s.session_id = fs.session_id
        WHERE s.tenant_id =
        "#,
    );
    builder.push_bind(tenant_id);

    if let Some(session_id) = &filter.session_id {
        builder.push(" AND fs.session_id = ").push_bind(session_id);
    }
    if let Some(contractor_id) = &filter.contractor_id {
        builder
            .push(" AND fs.contractor_id = ")
            .push_bind(contractor_id);
    }
    if let Some(form_id) = filter.form_id {
        builder.push(" AND fs.form_id = ").push_bind(form_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND fs.status = ").push_bind(status);
    }

    builder
        .push(" ORDER BY fs.created_at DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let rows = builder
        .build_query_as::<SubmissionRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Record a submitted form: answers, submitter, timestamp, status
pub async fn mark_submitted(
    conn: &mut SqliteConnection,
    submission_id: &str,
    answers: &Value,
    submitted_by: &str,
) -> ApiResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE form_submissions
        SET answers = ?, status = 'submitted', submitted_by = ?,
            submitted_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(Json(answers.clone()))
    .bind(submitted_by)
    .bind(now)
    .bind(now)
    .bind(submission_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record the external scoring result and complete the submission
pub async fn apply_scores(
    conn: &mut SqliteConnection,
    submission_id: &str,
    raw_score: f64,
    final_score: f64,
    processed_at: DateTime<Utc>,
    webhook_response: &Value,
) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE form_submissions
        SET raw_score = ?, final_score = ?, status = 'completed',
            processed_at = ?, webhook_response = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(raw_score)
    .bind(final_score)
    .bind(processed_at)
    .bind(Json(webhook_response.clone()))
    .bind(Utc::now())
    .bind(submission_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Insert one write-once question-score row
#[allow(clippy::too_many_arguments)]
pub async fn insert_question_score(
    conn: &mut SqliteConnection,
    submission_id: &str,
    question_id: &str,
    question_text: Option<&str>,
    answer_text: Option<&str>,
    ai_score: i64,
    ai_reasoning: Option<&str>,
    weight: f64,
) -> ApiResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO question_scores
            (id, submission_id, question_id, question_text, answer_text,
             ai_score, ai_reasoning, weight, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(submission_id)
    .bind(question_id)
    .bind(question_text)
    .bind(answer_text)
    .bind(ai_score)
    .bind(ai_reasoning)
    .bind(weight)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(id)
}

/// Completed-submission counts per form kind for one session
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FormCompletionCount {
    pub form_id: FormKind,
    pub completed: i64,
}

pub async fn completed_counts_by_form(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> ApiResult<Vec<FormCompletionCount>> {
    let rows = sqlx::query_as::<_, FormCompletionCount>(
        r#"
        SELECT form_id, COUNT(*) AS completed
        FROM form_submissions
        WHERE session_id = ? AND status = 'completed'
        GROUP BY form_id
        "#,
    )
    .bind(session_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Per-form submission statistics across all sessions of a tenant
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct FormStatRow {
    pub form_id: FormKind,
    pub total_submissions: i64,
    pub completed_submissions: i64,
    pub average_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

pub async fn form_stats_for_tenant(
    pool: &SqlitePool,
    tenant_id: &str,
) -> ApiResult<Vec<FormStatRow>> {
    let rows = sqlx::query_as::<_, FormStatRow>(
        r#"
        SELECT
            fs.form_id,
            COUNT(*) AS total_submissions,
            COALESCE(SUM(CASE WHEN fs.status = 'completed' THEN 1 ELSE 0 END), 0)
                AS completed_submissions,
            AVG(fs.final_score) AS average_score,
            MIN(fs.final_score) AS min_score,
            MAX(fs.final_score) AS max_score
        FROM form_submissions fs
        JOIN sessions s ON s.session_id = fs.session_id
        WHERE s.tenant_id = ?
        GROUP BY fs.form_id
        ORDER BY fs.form_id
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Question scores of one submission, in creation order
pub async fn question_scores(
    conn: &mut SqliteConnection,
    submission_id: &str,
) -> ApiResult<Vec<QuestionScoreRow>> {
    let rows = sqlx::query_as::<_, QuestionScoreRow>(
        "SELECT * FROM question_scores WHERE submission_id = ? ORDER BY created_at",
    )
    .bind(submission_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
