//! evp-api library - Evaluation Process HTTP service
//!
//! Sessions enroll contractors into the four-stage form workflow
//! (frm32..frm35); an external AI system scores submissions through a
//! webhook callback and the service derives per-contractor progress,
//! final scores, and outbound notification records.

use std::sync::Arc;

use axum::{middleware, Router};
use evp_common::auth::AuthVerifier;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod core;
pub mod db;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bearer-token verifier (RS256 / HS256 / disabled)
    pub auth: Arc<AuthVerifier>,
    /// Base URL of the external form-filling client, for invitation links
    pub form_base_url: String,
}

impl AppState {
    pub fn new(db: SqlitePool, auth: AuthVerifier, form_base_url: String) -> Self {
        Self {
            db,
            auth: Arc::new(auth),
            form_base_url,
        }
    }
}

/// Build application router
///
/// Tenant-scoped endpoints require a bearer token and tenant header; the
/// health endpoint and the external scoring callback are unauthenticated
/// (the callback sender is trusted at the network boundary, matching the
/// upstream deployment).
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, patch, post};

    let protected = Router::new()
        .route("/sessions", post(api::sessions::create_session))
        .route("/sessions", get(api::sessions::list_sessions))
        .route("/sessions/:session_id", get(api::sessions::get_session))
        .route(
            "/sessions/:session_id",
            patch(api::sessions::update_session),
        )
        .route(
            "/sessions/:session_id/progress",
            get(api::sessions::get_progress),
        )
        .route(
            "/sessions/:session_id/statistics",
            get(api::sessions::get_statistics),
        )
        .route(
            "/sessions/:session_id/notifications",
            get(api::notifications::list_for_session),
        )
        .route(
            "/sessions/:session_id/contractors/:contractor_id/remind",
            post(api::notifications::send_reminder),
        )
        .route("/forms/submit", post(api::forms::submit_form))
        .route("/forms/submissions", get(api::forms::list_submissions))
        .route("/forms/submissions/:id", get(api::forms::get_submission))
        .route("/admin/tenant-stats", get(api::sessions::tenant_stats))
        .route(
            "/notifications/:id/delivery",
            post(api::notifications::delivery_update),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(api::health::health_check))
        .route("/webhook/score/:form_id", post(api::webhook::score_webhook));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
