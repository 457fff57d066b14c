//! Notification endpoints
//!
//! Listing, admin-driven reminders, and the delivery collaborator's
//! status callback. The service never sends mail itself.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use evp_common::{FormKind, NotificationKind, NotificationStatus, SubmissionStatus};

use crate::api::auth::AuthContext;
use crate::core::notify;
use crate::db::{contractors, enrollments, notifications, sessions, submissions};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub session_id: String,
    pub contractor_id: Option<String>,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub notification_type: NotificationKind,
    pub form_id: Option<FormKind>,
    pub subject: String,
    pub body: String,
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<notifications::NotificationRow> for NotificationResponse {
    fn from(row: notifications::NotificationRow) -> Self {
        NotificationResponse {
            id: row.id,
            session_id: row.session_id,
            contractor_id: row.contractor_id,
            recipient_email: row.recipient_email,
            recipient_name: row.recipient_name,
            notification_type: row.notification_type,
            form_id: row.form_id,
            subject: row.subject,
            body: row.body,
            status: row.status,
            sent_at: row.sent_at,
            error_message: row.error_message,
            metadata: row.metadata.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeliveryUpdateRequest {
    pub status: NotificationStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderRequest {
    pub form_id: FormKind,
    #[serde(default = "default_cycle")]
    pub cycle: i64,
}

fn default_cycle() -> i64 {
    1
}

/// GET /sessions/:session_id/notifications
pub async fn list_for_session(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let mut conn = state.db.acquire().await?;
    sessions::get(&mut conn, &session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;
    drop(conn);

    let rows = notifications::list_for_session(&state.db, &session_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// POST /notifications/:id/delivery
///
/// Delivery collaborator callback: advance a pending notification to
/// sent/failed/bounced.
pub async fn delivery_update(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<DeliveryUpdateRequest>,
) -> ApiResult<Json<NotificationResponse>> {
    if body.status == NotificationStatus::Pending {
        return Err(ApiError::BadRequest(
            "delivery status must be sent, failed, or bounced".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;

    let row = notifications::get_by_id(&mut tx, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("notification {id}")))?;

    // Tenant scope through the owning session
    sessions::get(&mut tx, &row.session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("notification {id}")))?;

    if row.status != NotificationStatus::Pending {
        return Err(ApiError::InvalidStateTransition(format!(
            "notification {id} is {} and cannot be advanced",
            row.status
        )));
    }

    notifications::update_delivery(&mut tx, &id, body.status, body.error_message.as_deref())
        .await?;
    let updated = notifications::get_by_id(&mut tx, &id)
        .await?
        .ok_or_else(|| ApiError::Internal("notification vanished during update".to_string()))?;
    tx.commit().await?;

    Ok(Json(updated.into()))
}

/// POST /sessions/:session_id/contractors/:contractor_id/remind
///
/// Admin-requested reminder for one outstanding form, addressed to its
/// expected filler.
pub async fn send_reminder(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((session_id, contractor_id)): Path<(String, String)>,
    Json(body): Json<ReminderRequest>,
) -> ApiResult<Json<NotificationResponse>> {
    ctx.require_admin()?;

    let mut tx = state.db.begin().await?;

    sessions::get(&mut tx, &session_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;

    let contractor = contractors::get_in_tenant(&mut tx, &contractor_id, &ctx.tenant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("contractor {contractor_id}")))?;

    enrollments::get(&mut tx, &session_id, &contractor_id, body.cycle)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "enrollment ({session_id}, {contractor_id}, cycle {})",
                body.cycle
            ))
        })?;

    let submission =
        submissions::get_by_tuple(&mut tx, &session_id, &contractor_id, body.form_id, body.cycle)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "submission ({session_id}, {contractor_id}, {}, cycle {})",
                    body.form_id, body.cycle
                ))
            })?;

    if submission.status == SubmissionStatus::Completed {
        return Err(ApiError::InvalidStateTransition(format!(
            "form {} is already completed; nothing to remind",
            body.form_id
        )));
    }

    let reminder = notify::reminder(
        &contractor,
        &session_id,
        body.cycle,
        body.form_id,
        &state.form_base_url,
    );
    let id = notify::enqueue(&mut tx, &reminder).await?;

    let row = notifications::get_by_id(&mut tx, &id)
        .await?
        .ok_or_else(|| ApiError::Internal("notification vanished after enqueue".to_string()))?;
    tx.commit().await?;

    Ok(Json(row.into()))
}
