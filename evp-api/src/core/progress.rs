//! Status derivation engine
//!
//! Recomputes a contractor enrollment's status and final score whenever a
//! form submission completes. The recompute is never incremental: it
//! re-reads the full submission set for the (session, contractor, cycle)
//! tuple inside the caller's transaction, counts completed forms, and
//! rewrites the enrollment. Repeated invocation over the same rows yields
//! the same result, which makes at-least-once callback delivery safe.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use evp_common::{EnrollmentStatus, FormKind, SubmissionStatus};

use crate::core::notify;
use crate::core::scoring::{aggregate_final_score, FormScore};
use crate::db::{contractors, enrollments, submissions};
use crate::error::{ApiError, ApiResult};

/// Derive the enrollment status after a submission event.
///
/// Priority order, first match wins:
/// 1. all four forms completed -> completed
/// 2..5. the form that just completed -> its per-form completed status
/// 6. otherwise the previous status is retained
pub fn derive_status(
    completed_count: usize,
    just_completed: Option<FormKind>,
    previous: EnrollmentStatus,
) -> EnrollmentStatus {
    if completed_count == FormKind::ALL.len() {
        return EnrollmentStatus::Completed;
    }
    match just_completed {
        Some(form) => form.completed_status(),
        None => previous,
    }
}

/// Apply a completed-submission event: recompute the enrollment status and
/// final score, stamp the form's completion timestamp, and enqueue the
/// lifecycle notifications that the transition triggers. Must run inside
/// the same transaction as the submission write.
pub async fn apply_submission_completed(
    conn: &mut SqliteConnection,
    session_id: &str,
    contractor_id: &str,
    cycle: i64,
    completed_form: FormKind,
    form_base_url: &str,
) -> ApiResult<EnrollmentStatus> {
    let rows = submissions::list_for_tuple(conn, session_id, contractor_id, cycle).await?;
    let forms: Vec<FormScore> = rows.iter().map(FormScore::from).collect();

    let completed_count = forms
        .iter()
        .filter(|f| f.status == SubmissionStatus::Completed)
        .count();
    let final_score = aggregate_final_score(&forms);

    let enrollment = enrollments::get(conn, session_id, contractor_id, cycle)
        .await?
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "no enrollment for ({session_id}, {contractor_id}, cycle {cycle})"
            ))
        })?;

    let previous = enrollment.status;
    let status = derive_status(completed_count, Some(completed_form), previous);

    debug!(
        session_id,
        contractor_id,
        cycle,
        %completed_form,
        completed_count,
        ?final_score,
        %previous,
        %status,
        "status derivation"
    );

    enrollments::apply_derivation(
        conn,
        &enrollment.id,
        status,
        final_score,
        completed_form,
        Utc::now(),
    )
    .await?;

    // Lifecycle notifications fire only on transition, not on replay
    if status != previous {
        let contractor = contractors::get(conn, contractor_id).await?.ok_or_else(|| {
            ApiError::Internal(format!("contractor {contractor_id} missing for notification"))
        })?;

        if status == EnrollmentStatus::Frm32Completed {
            let invite = notify::supervisor_invite(
                &contractor,
                session_id,
                cycle,
                FormKind::Frm33,
                form_base_url,
            );
            notify::enqueue(conn, &invite).await?;
        }

        if status == EnrollmentStatus::Completed {
            let notice = notify::process_complete(&contractor, session_id);
            notify::enqueue(conn, &notice).await?;
        }
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_four_completed_wins() {
        let status = derive_status(4, Some(FormKind::Frm33), EnrollmentStatus::Frm35Completed);
        assert_eq!(status, EnrollmentStatus::Completed);
    }

    #[test]
    fn event_form_sets_per_form_status() {
        assert_eq!(
            derive_status(1, Some(FormKind::Frm32), EnrollmentStatus::Frm32Sent),
            EnrollmentStatus::Frm32Completed
        );
        assert_eq!(
            derive_status(2, Some(FormKind::Frm35), EnrollmentStatus::Frm32Completed),
            EnrollmentStatus::Frm35Completed
        );
        assert_eq!(
            derive_status(3, Some(FormKind::Frm34), EnrollmentStatus::Frm33Completed),
            EnrollmentStatus::Frm34Completed
        );
    }

    #[test]
    fn frm35_alone_reports_frm35_completed() {
        // frm35 completing with frm33/frm34 still incomplete reports
        // frm35_completed, never completed
        let status = derive_status(2, Some(FormKind::Frm35), EnrollmentStatus::Frm32Completed);
        assert_eq!(status, EnrollmentStatus::Frm35Completed);
    }

    #[test]
    fn no_event_retains_previous() {
        let status = derive_status(2, None, EnrollmentStatus::Frm33Completed);
        assert_eq!(status, EnrollmentStatus::Frm33Completed);
    }

    #[test]
    fn three_completed_is_never_completed() {
        for form in [FormKind::Frm33, FormKind::Frm34, FormKind::Frm35] {
            let status = derive_status(3, Some(form), EnrollmentStatus::Frm32Completed);
            assert_ne!(status, EnrollmentStatus::Completed);
        }
    }

    #[test]
    fn recompute_is_idempotent() {
        let first = derive_status(2, Some(FormKind::Frm35), EnrollmentStatus::Frm32Completed);
        for _ in 0..5 {
            assert_eq!(
                derive_status(2, Some(FormKind::Frm35), EnrollmentStatus::Frm32Completed),
                first
            );
        }
    }
}
