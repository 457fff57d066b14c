//! Authentication, authorization, and tenant-isolation tests
//!
//! Verifies bearer-token verification, role gating at mutating entry
//! points, tenant scoping of every read, and the terminal-state rules of
//! the session lifecycle.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`

use evp_api::{build_router, AppState};
use evp_common::auth::{AuthVerifier, Claims};

const SECRET: &str = "security-test-secret";
const FORM_BASE_URL: &str = "https://forms.example.test";

const ADMIN: i64 = 2;
const CONTRACTOR_ADMIN: i64 = 4;
const SUPERVISOR: i64 = 5;

async fn setup() -> (Router, SqlitePool) {
    let pool = evp_api::db::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    evp_api::db::init::init_schema(&pool)
        .await
        .expect("schema init");

    let state = AppState::new(
        pool.clone(),
        AuthVerifier::hs256(SECRET),
        FORM_BASE_URL.to_string(),
    );
    (build_router(state), pool)
}

fn token(role_id: i64, tenant: Option<&str>) -> String {
    let claims = Claims {
        sub: format!("user-{role_id}"),
        role_id,
        tenant_id: tenant.map(str::to_string),
        email: None,
        exp: Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn authed(
    method: &str,
    uri: &str,
    role_id: i64,
    tenant: &str,
    body: Option<Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token(role_id, Some(tenant))))
        .header("X-Tenant-ID", tenant)
        .header("content-type", "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

async fn seed_contractor(pool: &SqlitePool, tenant: &str) -> String {
    evp_api::db::contractors::insert(
        pool,
        tenant,
        "Acme Industrial",
        "Jordan Reyes",
        "jordan@acme.test",
        Some("Sam Okafor"),
        Some("sam@acme.test"),
    )
    .await
    .expect("seed contractor")
}

async fn start_session(app: &Router, tenant: &str, contractor_id: &str) -> String {
    let (status, body) = send(
        app,
        authed(
            "POST",
            "/sessions",
            ADMIN,
            tenant,
            Some(json!({ "contractor_ids": [contractor_id] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["session_id"].as_str().unwrap().to_string()
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn health_endpoint_requires_no_auth() {
    let (app, _pool) = setup().await;
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "evp-api");
}

#[tokio::test]
async fn protected_route_rejects_missing_token() {
    let (app, _pool) = setup().await;
    let request = Request::builder()
        .method("GET")
        .uri("/sessions")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn protected_route_rejects_garbage_token() {
    let (app, _pool) = setup().await;
    let request = Request::builder()
        .method("GET")
        .uri("/sessions")
        .header("authorization", "Bearer not.a.token")
        .header("X-Tenant-ID", "tenant-a")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn tenant_must_be_resolvable() {
    let (app, _pool) = setup().await;
    // Valid token without a tenant claim and no X-Tenant-ID header
    let request = Request::builder()
        .method("GET")
        .uri("/sessions")
        .header("authorization", format!("Bearer {}", token(ADMIN, None)))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn tenant_claim_is_the_fallback_scope() {
    let (app, pool) = setup().await;
    let contractor_id = seed_contractor(&pool, "tenant-a").await;
    let session_id = start_session(&app, "tenant-a", &contractor_id).await;

    // No X-Tenant-ID header: the token's tenant claim applies
    let request = Request::builder()
        .method("GET")
        .uri(format!("/sessions/{session_id}"))
        .header(
            "authorization",
            format!("Bearer {}", token(ADMIN, Some("tenant-a"))),
        )
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], session_id.as_str());
}

// =============================================================================
// Role gating
// =============================================================================

#[tokio::test]
async fn only_admins_start_sessions() {
    let (app, pool) = setup().await;
    let contractor_id = seed_contractor(&pool, "tenant-a").await;

    for role in [CONTRACTOR_ADMIN, SUPERVISOR] {
        let (status, body) = send(
            &app,
            authed(
                "POST",
                "/sessions",
                role,
                "tenant-a",
                Some(json!({ "contractor_ids": [contractor_id] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }
}

#[tokio::test]
async fn form_intake_enforces_the_expected_filler() {
    let (app, pool) = setup().await;
    let contractor_id = seed_contractor(&pool, "tenant-a").await;
    let session_id = start_session(&app, "tenant-a", &contractor_id).await;

    // A supervisor may not file the contractor self-assessment
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/forms/submit",
            SUPERVISOR,
            "tenant-a",
            Some(json!({
                "session_id": session_id,
                "contractor_id": contractor_id,
                "form_id": "frm32",
                "answers": { "q1": "a" },
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // An admin may submit on anyone's behalf
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/forms/submit",
            ADMIN,
            "tenant-a",
            Some(json!({
                "session_id": session_id,
                "contractor_id": contractor_id,
                "form_id": "frm32",
                "answers": { "q1": "a" },
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "submitted");
}

#[tokio::test]
async fn only_admins_read_tenant_stats() {
    let (app, _pool) = setup().await;
    let (status, _) = send(
        &app,
        authed("GET", "/admin/tenant-stats", SUPERVISOR, "tenant-a", None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        authed("GET", "/admin/tenant-stats", ADMIN, "tenant-a", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_sessions"], 0);
}

#[tokio::test]
async fn only_admins_send_reminders() {
    let (app, pool) = setup().await;
    let contractor_id = seed_contractor(&pool, "tenant-a").await;
    let session_id = start_session(&app, "tenant-a", &contractor_id).await;

    let (status, body) = send(
        &app,
        authed(
            "POST",
            &format!("/sessions/{session_id}/contractors/{contractor_id}/remind"),
            SUPERVISOR,
            "tenant-a",
            Some(json!({ "form_id": "frm33" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

// =============================================================================
// Tenant isolation
// =============================================================================

#[tokio::test]
async fn sessions_are_invisible_across_tenants() {
    let (app, pool) = setup().await;
    let contractor_id = seed_contractor(&pool, "tenant-a").await;
    let session_id = start_session(&app, "tenant-a", &contractor_id).await;

    let (status, body) = send(
        &app,
        authed(
            "GET",
            &format!("/sessions/{session_id}"),
            ADMIN,
            "tenant-b",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(
        &app,
        authed(
            "GET",
            &format!("/forms/submissions?session_id={session_id}"),
            ADMIN,
            "tenant-b",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn foreign_contractors_are_not_enrollable() {
    let (app, pool) = setup().await;
    let foreign = seed_contractor(&pool, "tenant-b").await;

    // Contractors outside the tenant are skipped, so nobody gets notified
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/sessions",
            ADMIN,
            "tenant-a",
            Some(json!({ "contractor_ids": [foreign] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contractors_notified"], 0);
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn terminal_sessions_reject_further_transitions() {
    let (app, pool) = setup().await;
    let contractor_id = seed_contractor(&pool, "tenant-a").await;
    let session_id = start_session(&app, "tenant-a", &contractor_id).await;

    let (status, body) = send(
        &app,
        authed(
            "PATCH",
            &format!("/sessions/{session_id}"),
            ADMIN,
            "tenant-a",
            Some(json!({ "status": "completed" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["completed_at"].is_string());

    for target in ["active", "cancelled"] {
        let (status, body) = send(
            &app,
            authed(
                "PATCH",
                &format!("/sessions/{session_id}"),
                ADMIN,
                "tenant-a",
                Some(json!({ "status": target })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");
    }
}

#[tokio::test]
async fn cancelled_sessions_reject_intake_and_scoring() {
    let (app, pool) = setup().await;
    let contractor_id = seed_contractor(&pool, "tenant-a").await;
    let session_id = start_session(&app, "tenant-a", &contractor_id).await;

    // Submit frm32 while still active so a scoring target exists
    let (status, submitted) = send(
        &app,
        authed(
            "POST",
            "/forms/submit",
            CONTRACTOR_ADMIN,
            "tenant-a",
            Some(json!({
                "session_id": session_id,
                "contractor_id": contractor_id,
                "form_id": "frm32",
                "answers": { "q1": "a" },
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sub_id = submitted["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        authed(
            "PATCH",
            &format!("/sessions/{session_id}"),
            ADMIN,
            "tenant-a",
            Some(json!({ "status": "cancelled" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Intake is closed
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/forms/submit",
            SUPERVISOR,
            "tenant-a",
            Some(json!({
                "session_id": session_id,
                "contractor_id": contractor_id,
                "form_id": "frm33",
                "answers": { "q1": "a" },
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");

    // Late scoring callbacks are rejected too
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/score/frm32")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "submission_id": sub_id,
                "question_scores": [],
                "raw_score": 80.0,
                "final_score": 80.0,
                "ai_summary": null,
                "processed_at": Utc::now().to_rfc3339(),
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");
}
