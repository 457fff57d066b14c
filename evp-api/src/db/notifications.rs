//! Notification log queries
//!
//! The service only enqueues rows; delivery is an external collaborator
//! that reports back through the delivery-status callback.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use evp_common::{FormKind, NotificationKind, NotificationStatus};

use crate::error::ApiResult;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
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
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
}

/// A notification ready to enqueue
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub session_id: String,
    pub contractor_id: Option<String>,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub notification_type: NotificationKind,
    pub form_id: Option<FormKind>,
    pub subject: String,
    pub body: String,
    /// Almost always Pending; Failed is used when the recipient could not
    /// be resolved, so the gap stays auditable.
    pub status: NotificationStatus,
    pub error_message: Option<String>,
}

/// Append a notification row
pub async fn insert(conn: &mut SqliteConnection, new: &NewNotification) -> ApiResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO notifications
            (id, session_id, contractor_id, recipient_email, recipient_name,
             notification_type, form_id, subject, body, status,
             error_message, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '{}', ?)
        "#,
    )
    .bind(&id)
    .bind(&new.session_id)
    .bind(&new.contractor_id)
    .bind(&new.recipient_email)
    .bind(&new.recipient_name)
    .bind(new.notification_type)
    .bind(new.form_id)
    .bind(&new.subject)
    .bind(&new.body)
    .bind(new.status)
    .bind(&new.error_message)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(id)
}

pub async fn get_by_id(
    conn: &mut SqliteConnection,
    notification_id: &str,
) -> ApiResult<Option<NotificationRow>> {
    let row = sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = ?")
        .bind(notification_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Notifications of one session, newest first
pub async fn list_for_session(
    pool: &SqlitePool,
    session_id: &str,
) -> ApiResult<Vec<NotificationRow>> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT * FROM notifications WHERE session_id = ? ORDER BY created_at DESC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Advance delivery status; stamps sent_at when delivery succeeded
pub async fn update_delivery(
    conn: &mut SqliteConnection,
    notification_id: &str,
    status: NotificationStatus,
    error_message: Option<&str>,
) -> ApiResult<()> {
    let sent_at = match status {
        NotificationStatus::Sent => Some(Utc::now()),
        _ => None,
    };
    sqlx::query(
        "UPDATE notifications SET status = ?, sent_at = ?, error_message = ? WHERE id = ?",
    )
    .bind(status)
    .bind(sent_at)
    .bind(error_message)
    .bind(notification_id)
    .execute(conn)
    .await?;
    Ok(())
}
