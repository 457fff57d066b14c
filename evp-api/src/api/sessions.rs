//! Session management endpoints
//!
//! Session creation enrolls contractors, seeds the four pending form
//! submissions per enrollment, and enqueues FRM32 invitations — all within
//! one transaction.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use evp_common::{EnrollmentStatus, FormKind, SessionStatus, SubmissionStatus};

use crate::api::auth::AuthContext;
use crate::core::notify;
use crate::db::{contractors, enrollments, sessions, submissions};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

fn empty_object() -> Value {
    Value::Object(Default::default())
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub contractor_ids: Vec<String>,
    pub custom_message: Option<String>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
pub struct StartProcessResponse {
    pub session_id: String,
    pub contractors_notified: usize,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub status: Option<SessionStatus>,
    pub custom_message: Option<String>,
    pub metadata: Option<Value>,
}

/// Session detail enriched with contractor rollups
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub session_id: String,
    pub tenant_id: String,
    pub created_by: String,
    pub status: SessionStatus,
    pub custom_message: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub total_contractors: i64,
    pub completed_contractors: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ContractorProgress {
    pub contractor_id: String,
    pub contractor_name: String,
    pub session_id: String,
    pub cycle: i64,
    pub frm32_status: Option<SubmissionStatus>,
    pub frm33_status: Option<SubmissionStatus>,
    pub frm34_status: Option<SubmissionStatus>,
    pub frm35_status: Option<SubmissionStatus>,
    pub frm32_score: Option<f64>,
    pub frm33_score: Option<f64>,
    pub frm34_score: Option<f64>,
    pub frm35_score: Option<f64>,
    pub final_score: Option<f64>,
    pub overall_status: EnrollmentStatus,
}

#[derive(Debug, Serialize)]
pub struct SessionStatistics {
    pub session_id: String,
    pub tenant_id: String,
    pub total_contractors: i64,
    pub pending_contractors: i64,
    pub in_progress_contractors: i64,
    pub completed_contractors: i64,
    pub average_final_score: Option<f64>,
    pub frm32_completion_rate: f64,
    pub frm33_completion_rate: f64,
    pub frm34_completion_rate: f64,
    pub frm35_completion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct TenantStats {
    pub tenant_id: String,
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub cancelled_sessions: usize,
    pub total_forms_submitted: i64,
    pub form_stats: Vec<submissions::FormStatRow>,
}

async fn enrich(conn: &mut SqliteConnection, row: sessions::SessionRow) -> ApiResult<SessionResponse> {
    let stats = sessions::contractor_stats(conn, &row.session_id).await?;
    Ok(SessionResponse {
        id: row.id,
        session_id: row.session_id,
        tenant_id: row.tenant_id,
        created_by: row.created_by,
        status: row.status,
        custom_message: row.custom_message,
        metadata: row.metadata.0,
        created_at: row.created_at,
        completed_at: row.completed_at,
        updated_at: row.updated_at,
        total_contractors: stats.total_contractors,
        completed_contractors: stats.completed_contractors,
        average_score: stats.average_score,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /sessions
///
/// Start a new evaluation process: create the session, enroll contractors
/// (cycle 1), seed the four pending form submissions per contractor, and
/// enqueue FRM32 invitations. Admin only.
pub async fn create_session(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult<Json<StartProcessResponse>> {
    ctx.require_admin()?;

    if body.contractor_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "contractor_ids must not be empty".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;

    let session_id = sessions::generate_session_id(&mut tx).await?;
    sessions::insert(
        &mut tx,
        &session_id,
        &ctx.tenant_id,
        &ctx.claims.sub,
        body.custom_message.as_deref(),
        &body.metadata,
    )
    .await?;

    let mut notified = 0;
    for contractor_id in &body.contractor_ids {
        let Some(contractor) =
            contractors::get_in_tenant(&mut tx, contractor_id, &ctx.tenant_id).await?
        else {
            warn!(%contractor_id, "skipping contractor outside tenant");
            continue;
        };

        let enrollment_id = enrollments::insert(&mut tx, &session_id, contractor_id, 1).await?;

        for form in FormKind::ALL {
            submissions::insert_pending(&mut tx, &session_id, contractor_id, form, 1).await?;
        }

        let invite = notify::frm32_invite(
            &contractor,
            &session_id,
            body.custom_message.as_deref(),
            &state.form_base_url,
        );
        notify::enqueue(&mut tx, &invite).await?;
        enrollments::mark_frm32_sent(&mut tx, &enrollment_id).await?;

        notified += 1;
    }

    tx.commit().await?;

    info!(%session_id, notified, "evaluation process started");

    Ok(Json(StartProcessResponse {
        message: format!("Successfully started evaluation process for {notified} contractor(s)"),
        session_id,
        contractors_notified: notified,
    }))
}

/// GET /sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let rows = sessions::list(
        &state.db,
        &ctx.tenant_id,
        query.status,
        query.limit,
        query.offset,
    )
    .await?;

    let mut conn = state.db.acquire().await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(enrich(&mut conn, row).await?);
    }
    Ok(Json(out))
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let mut conn = state.db.acquire().await?;
    let row = sessions::get(&mut conn, &session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;
    Ok(Json(enrich(&mut conn, row).await?))
}

/// PATCH /sessions/:session_id
///
/// Admin-only status/message/metadata update. active -> completed|cancelled
/// only; terminal states reject further transitions. Completion is an
/// administrative signal and does not cascade to enrollments.
pub async fn update_session(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(session_id): Path<String>,
    Json(body): Json<UpdateSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    ctx.require_admin()?;

    let mut tx = state.db.begin().await?;
    let row = sessions::get(&mut tx, &session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;

    let new_status = body.status.unwrap_or(row.status);
    if new_status != row.status && row.status.is_terminal() {
        return Err(ApiError::InvalidStateTransition(format!(
            "session {session_id} is {} and cannot transition to {new_status}",
            row.status
        )));
    }

    let completed_at = if new_status == SessionStatus::Completed && row.completed_at.is_none() {
        Some(Utc::now())
    } else {
        row.completed_at
    };

    let custom_message = body.custom_message.or(row.custom_message);
    let metadata = body.metadata.unwrap_or(row.metadata.0);

    sessions::update(
        &mut tx,
        &session_id,
        &ctx.tenant_id,
        new_status,
        custom_message.as_deref(),
        &metadata,
        completed_at,
    )
    .await?;

    let updated = sessions::get(&mut tx, &session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::Internal("session vanished during update".to_string()))?;
    let response = enrich(&mut tx, updated).await?;
    tx.commit().await?;

    Ok(Json(response))
}

/// GET /sessions/:session_id/progress
///
/// Per-contractor rollup: per-form status/score plus the derived overall
/// enrollment status.
pub async fn get_progress(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<ContractorProgress>>> {
    let mut conn = state.db.acquire().await?;
    sessions::get(&mut conn, &session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;

    let rows = enrollments::list_for_session(&mut conn, &session_id).await?;
    let mut out = Vec::with_capacity(rows.len());

    for enrollment in rows {
        let contractor_name = contractors::get(&mut conn, &enrollment.contractor_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();

        let subs = submissions::list_for_tuple(
            &mut conn,
            &session_id,
            &enrollment.contractor_id,
            enrollment.cycle,
        )
        .await?;

        let find = |kind: FormKind| subs.iter().find(|s| s.form_id == kind);
        let status_of = |kind: FormKind| find(kind).map(|s| s.status);
        let score_of = |kind: FormKind| find(kind).and_then(|s| s.final_score);

        out.push(ContractorProgress {
            contractor_id: enrollment.contractor_id.clone(),
            contractor_name,
            session_id: session_id.clone(),
            cycle: enrollment.cycle,
            frm32_status: status_of(FormKind::Frm32),
            frm33_status: status_of(FormKind::Frm33),
            frm34_status: status_of(FormKind::Frm34),
            frm35_status: status_of(FormKind::Frm35),
            frm32_score: score_of(FormKind::Frm32),
            frm33_score: score_of(FormKind::Frm33),
            frm34_score: score_of(FormKind::Frm34),
            frm35_score: score_of(FormKind::Frm35),
            final_score: enrollment.final_score,
            overall_status: enrollment.status,
        });
    }

    Ok(Json(out))
}

/// GET /sessions/:session_id/statistics
pub async fn get_statistics(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionStatistics>> {
    let mut conn = state.db.acquire().await?;
    let session = sessions::get(&mut conn, &session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;

    let rows = enrollments::list_for_session(&mut conn, &session_id).await?;
    let total = rows.len() as i64;
    let pending = rows
        .iter()
        .filter(|e| e.status == EnrollmentStatus::Pending)
        .count() as i64;
    let completed = rows
        .iter()
        .filter(|e| e.status == EnrollmentStatus::Completed)
        .count() as i64;
    let in_progress = total - pending - completed;

    let scores: Vec<f64> = rows.iter().filter_map(|e| e.final_score).collect();
    let average_final_score = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let counts = submissions::completed_counts_by_form(&mut conn, &session_id).await?;
    let rate = |kind: FormKind| {
        if total == 0 {
            return 0.0;
        }
        counts
            .iter()
            .find(|c| c.form_id == kind)
            .map(|c| c.completed as f64 / total as f64)
            .unwrap_or(0.0)
    };

    Ok(Json(SessionStatistics {
        session_id,
        tenant_id: session.tenant_id,
        total_contractors: total,
        pending_contractors: pending,
        in_progress_contractors: in_progress,
        completed_contractors: completed,
        average_final_score,
        frm32_completion_rate: rate(FormKind::Frm32),
        frm33_completion_rate: rate(FormKind::Frm33),
        frm34_completion_rate: rate(FormKind::Frm34),
        frm35_completion_rate: rate(FormKind::Frm35),
    }))
}

/// GET /admin/tenant-stats
///
/// Tenant-wide rollup across all sessions. Admin only.
pub async fn tenant_stats(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> ApiResult<Json<TenantStats>> {
    ctx.require_admin()?;

    let all = sessions::list_all_for_tenant(&state.db, &ctx.tenant_id).await?;
    let count_status =
        |status: SessionStatus| all.iter().filter(|s| s.status == status).count();

    let form_stats = submissions::form_stats_for_tenant(&state.db, &ctx.tenant_id).await?;
    let total_forms_submitted = form_stats.iter().map(|f| f.total_submissions).sum();

    Ok(Json(TenantStats {
        tenant_id: ctx.tenant_id.clone(),
        total_sessions: all.len(),
        active_sessions: count_status(SessionStatus::Active),
        completed_sessions: count_status(SessionStatus::Completed),
        cancelled_sessions: count_status(SessionStatus::Cancelled),
        total_forms_submitted,
        form_stats,
    }))
}
