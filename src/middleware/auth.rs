//! Authentication middleware
//!
//! Resolves the caller from the `access_token` cookie (or a bearer header)
//! and stores a `RequestContext` in the request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::entity::emp_account::role;
use crate::error::AppError;
use crate::jwt;
use crate::state::AppState;

/// Cookie carrying the access JWT
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie carrying the opaque refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Authenticated caller, passed to handlers through `Extension`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub account_id: i64,
    pub tenant_id: i64,
    pub username: String,
    pub role: String,
}

impl RequestContext {
    pub fn is_admin(&self) -> bool {
        self.role == role::ADMIN
    }

    /// Fail with 403 unless the caller is a tenant admin
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl From<jwt::Claims> for RequestContext {
    fn from(claims: jwt::Claims) -> Self {
        Self {
            account_id: claims.sub,
            tenant_id: claims.tid,
            username: claims.usr,
            role: claims.role,
        }
    }
}

/// Paths that don't require authentication.
///
/// A valid token on a public path still yields a `RequestContext`; logout
/// relies on that while tolerating an expired access token.
fn is_public_path(path: &str) -> bool {
    // Only API routes are authenticated
    let Some(rest) = path.strip_prefix("/api") else {
        return true;
    };
    let rest = rest.trim_matches('/');

    [
        "auth/login",
        "auth/refresh",
        "auth/logout",
        "csrf/token",
        "health-check",
        "api-docs",
    ]
        .iter()
        .any(|p| rest == *p || rest.strip_prefix(p).is_some_and(|r| r.starts_with('/')))
}

fn access_token(jar: &CookieJar, request: &Request<Body>) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let public = is_public_path(request.uri().path());

    let Some(token) = access_token(&jar, &request) else {
        if public {
            return next.run(request).await;
        }
        return AppError::Unauthorized.into_response();
    };

    match jwt::verify(&token, &state.config.auth.jwt_secret) {
        Ok(claims) => {
            request.extensions_mut().insert(RequestContext::from(claims));
            next.run(request).await
        }
        // Public routes still run, just without a caller
        Err(_) if public => next.run(request).await,
        Err(e) => {
            tracing::debug!("Rejected access token: {}", e);
            AppError::Unauthorized.into_response()
        }
    }
}
