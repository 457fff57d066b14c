//! Form submission endpoints
//!
//! Intake validates the state machine and the submitter's role in-process;
//! scoring arrives later through the webhook callback.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use evp_common::{FormKind, SessionStatus, SubmissionStatus};

use crate::api::auth::AuthContext;
use crate::db::{contractors, sessions, submissions};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitFormRequest {
    pub session_id: String,
    pub contractor_id: String,
    pub form_id: FormKind,
    #[serde(default = "default_cycle")]
    pub cycle: i64,
    pub answers: Value,
}

fn default_cycle() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    pub session_id: Option<String>,
    pub contractor_id: Option<String>,
    pub form_id: Option<FormKind>,
    pub status: Option<SubmissionStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: String,
    pub session_id: String,
    pub contractor_id: String,
    pub form_id: FormKind,
    pub cycle: i64,
    pub answers: Value,
    pub raw_score: Option<f64>,
    pub final_score: Option<f64>,
    pub status: SubmissionStatus,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_scores: Option<Vec<submissions::QuestionScoreRow>>,
}

impl From<submissions::SubmissionRow> for SubmissionResponse {
    fn from(row: submissions::SubmissionRow) -> Self {
        SubmissionResponse {
            id: row.id,
            session_id: row.session_id,
            contractor_id: row.contractor_id,
            form_id: row.form_id,
            cycle: row.cycle,
            answers: row.answers.0,
            raw_score: row.raw_score,
            final_score: row.final_score,
            status: row.status,
            submitted_by: row.submitted_by,
            submitted_at: row.submitted_at,
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            question_scores: None,
        }
    }
}

/// POST /forms/submit
///
/// Submit one form of the sequence. The submission row must exist (created
/// pending at enrollment) and still be pending; the submitter's role must
/// match the form's expected filler (admins may submit on anyone's
/// behalf). Cancelled and completed sessions reject intake.
pub async fn submit_form(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(body): Json<SubmitFormRequest>,
) -> ApiResult<Json<SubmissionResponse>> {
    let is_object = body.answers.as_object().map(|m| !m.is_empty());
    if is_object != Some(true) {
        return Err(ApiError::BadRequest(
            "answers must be a non-empty object".to_string(),
        ));
    }

    let expected = body.form_id.expected_submitter_tier();
    if ctx.claims.role_id != expected && !ctx.claims.is_admin() {
        return Err(ApiError::Forbidden(format!(
            "form {} expects role tier {expected}",
            body.form_id
        )));
    }

    let mut tx = state.db.begin().await?;

    let session = sessions::get(&mut tx, &body.session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {}", body.session_id)))?;
    if session.status != SessionStatus::Active {
        return Err(ApiError::InvalidStateTransition(format!(
            "session {} is {} and no longer accepts submissions",
            body.session_id, session.status
        )));
    }

    contractors::get_in_tenant(&mut tx, &body.contractor_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("contractor {}", body.contractor_id)))?;

    let submission = submissions::get_by_tuple(
        &mut tx,
        &body.session_id,
        &body.contractor_id,
        body.form_id,
        body.cycle,
    )
    .await?
    .ok_or_else(|| {
        ApiError::NotFound(format!(
            "submission ({}, {}, {}, cycle {})",
            body.session_id, body.contractor_id, body.form_id, body.cycle
        ))
    })?;

    if submission.status != SubmissionStatus::Pending {
        return Err(ApiError::InvalidStateTransition(format!(
            "submission {} is {} and cannot be submitted again",
            submission.id, submission.status
        )));
    }

    submissions::mark_submitted(&mut tx, &submission.id, &body.answers, &ctx.claims.sub).await?;

    let updated = submissions::get_by_id(&mut tx, &submission.id)
        .await?
        .ok_or_else(|| ApiError::Internal("submission vanished during update".to_string()))?;
    tx.commit().await?;

    Ok(Json(updated.into()))
}

/// GET /forms/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListSubmissionsQuery>,
) -> ApiResult<Json<Vec<SubmissionResponse>>> {
    let filter = submissions::SubmissionFilter {
        session_id: query.session_id,
        contractor_id: query.contractor_id,
        form_id: query.form_id,
        status: query.status,
        limit: query.limit,
        offset: query.offset,
    };
    let rows = submissions::list(&state.db, &ctx.tenant_id, &filter).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /forms/submissions/:id
///
/// Detail including per-question scores.
pub async fn get_submission(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmissionResponse>> {
    let mut conn = state.db.acquire().await?;
    let row = submissions::get_by_id(&mut conn, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("submission {id}")))?;

    // Tenant scope is established through the owning session
    sessions::get(&mut conn, &row.session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("submission {id}")))?;

    let scores = submissions::question_scores(&mut conn, &id).await?;
    let mut response: SubmissionResponse = row.into();
    response.question_scores = Some(scores);
    Ok(Json(response))
}
