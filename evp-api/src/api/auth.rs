//! Authentication middleware and caller context
//!
//! Verifies the bearer token and resolves the tenant scope for every
//! protected route. Role checks happen in-process at each mutating entry
//! point; the database layer is never the enforcement point.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use evp_common::auth::Claims;

use crate::error::ApiError;
use crate::AppState;

/// Verified caller identity attached to every protected request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    /// Resolved tenant scope: X-Tenant-ID header, falling back to the
    /// token's tenant claim
    pub tenant_id: String,
}

impl AuthContext {
    /// Admin gate: role tier 1-3
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.claims.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin access required".to_string()))
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("auth context missing from request".to_string()))
    }
}

/// Middleware for all tenant-scoped routes: verify the bearer token and
/// resolve the tenant, then attach an AuthContext extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = if state.auth.is_disabled() {
        Claims::local_admin()
    } else {
        let header = request
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".to_string()))?;

        state
            .auth
            .verify(token)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?
    };

    let header_tenant = request
        .headers()
        .get("X-Tenant-ID")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let tenant_id = header_tenant
        .or_else(|| claims.tenant_id.clone())
        .ok_or_else(|| {
            ApiError::BadRequest(
                "missing tenant id (provide X-Tenant-ID header or a tenant_id claim)".to_string(),
            )
        })?;

    request
        .extensions_mut()
        .insert(AuthContext { claims, tenant_id });

    Ok(next.run(request).await)
}
