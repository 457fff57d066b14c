//! External scoring callback
//!
//! The AI-scoring system posts per-question and aggregate scores here after
//! processing a submitted form. The whole payload is validated before any
//! write, and the status derivation engine runs inside the same transaction
//! as the score write so enrollment status is never stale.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use evp_common::{FormKind, SessionStatus, SubmissionStatus};

use crate::core::progress;
use crate::db::{sessions, submissions};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Discrete score scale assigned by the external AI
const VALID_AI_SCORES: [i64; 4] = [0, 3, 6, 10];

#[derive(Debug, Deserialize)]
pub struct QuestionScorePayload {
    pub question_id: String,
    pub question_text: Option<String>,
    pub answer_text: Option<String>,
    pub ai_score: i64,
    pub ai_reasoning: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct ScoreWebhookPayload {
    pub submission_id: String,
    pub question_scores: Vec<QuestionScorePayload>,
    pub raw_score: f64,
    pub final_score: f64,
    pub ai_summary: Option<String>,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ScoreWebhookResponse {
    pub success: bool,
    pub message: String,
    pub submission_id: String,
    pub final_score: Option<f64>,
}

/// POST /webhook/score/:form_id
pub async fn score_webhook(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    Json(payload): Json<ScoreWebhookPayload>,
) -> ApiResult<Json<ScoreWebhookResponse>> {
    let form: FormKind = form_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown form kind: {form_id}")))?;

    // Validate the whole payload before touching the database: a single
    // out-of-range score rejects everything atomically
    for (idx, q) in payload.question_scores.iter().enumerate() {
        if !VALID_AI_SCORES.contains(&q.ai_score) {
            return Err(ApiError::InvalidScore(format!(
                "question_scores[{idx}] ({}) has ai_score {} outside {{0, 3, 6, 10}}",
                q.question_id, q.ai_score
            )));
        }
    }

    let mut tx = state.db.begin().await?;

    let submission = submissions::get_by_id(&mut tx, &payload.submission_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("submission {}", payload.submission_id)))?;

    if submission.form_id != form {
        return Err(ApiError::BadRequest(format!(
            "submission {} is a {} form, callback addressed {form}",
            submission.id, submission.form_id
        )));
    }

    let session = sessions::get_any(&mut tx, &submission.session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {}", submission.session_id)))?;
    if session.status == SessionStatus::Cancelled {
        return Err(ApiError::InvalidStateTransition(format!(
            "session {} is cancelled and no longer accepts scoring results",
            session.session_id
        )));
    }

    // At-least-once delivery: a replay of an already-applied result is
    // acknowledged without rewriting; a conflicting result is rejected.
    if submission.status == SubmissionStatus::Completed {
        return if submission.final_score == Some(payload.final_score) {
            Ok(Json(ScoreWebhookResponse {
                success: true,
                message: format!(
                    "submission already scored; duplicate {} callback ignored",
                    form.as_str().to_uppercase()
                ),
                submission_id: payload.submission_id,
                final_score: submission.final_score,
            }))
        } else {
            Err(ApiError::InvalidStateTransition(format!(
                "submission {} is already completed with a different score",
                submission.id
            )))
        };
    }

    for q in &payload.question_scores {
        submissions::insert_question_score(
            &mut tx,
            &submission.id,
            &q.question_id,
            q.question_text.as_deref(),
            q.answer_text.as_deref(),
            q.ai_score,
            q.ai_reasoning.as_deref(),
            q.weight,
        )
        .await?;
    }

    let webhook_response = serde_json::json!({
        "ai_summary": payload.ai_summary,
        "metadata": payload.metadata,
    });
    submissions::apply_scores(
        &mut tx,
        &submission.id,
        payload.raw_score,
        payload.final_score,
        payload.processed_at,
        &webhook_response,
    )
    .await?;

    let status = progress::apply_submission_completed(
        &mut tx,
        &submission.session_id,
        &submission.contractor_id,
        submission.cycle,
        form,
        &state.form_base_url,
    )
    .await?;

    tx.commit().await?;

    info!(
        submission_id = %submission.id,
        %form,
        enrollment_status = %status,
        final_score = payload.final_score,
        "scoring callback applied"
    );

    Ok(Json(ScoreWebhookResponse {
        success: true,
        message: format!(
            "Successfully processed {} submission",
            form.as_str().to_uppercase()
        ),
        submission_id: payload.submission_id,
        final_score: Some(payload.final_score),
    }))
}
