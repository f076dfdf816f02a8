//! CSRF protection middleware
//!
//! Double-submit cookie pattern: a random token lives in the `csrf_token`
//! cookie and must be echoed in the `x-csrf-token` header on every
//! non-GET request outside the exempt list. A verified request rotates the
//! cookie token.
//!
//! Rotation is not versioned: two mutating requests sent concurrently with
//! the same token both pass, and the browser keeps whichever rotated cookie
//! arrives last.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::config::CsrfConfig;
use crate::error::AppError;
use crate::token::random_hex;

/// Token length in bytes before hex encoding
pub const TOKEN_BYTES: usize = 32;

/// Marks a response that already carries a freshly issued token cookie
#[derive(Clone, Debug)]
pub struct IssuedCsrfToken(pub String);

/// Resolved CSRF settings shared by the guard and the token endpoint
#[derive(Clone, Debug)]
pub struct CsrfPolicy {
    pub cookie_name: String,
    pub header_name: String,
    pub max_age_secs: i64,
    pub secure: bool,
    pub rotate_on_success: bool,
    exempt_paths: Vec<String>,
}

impl CsrfPolicy {
    pub fn from_config(config: &CsrfConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            header_name: config.header_name.to_ascii_lowercase(),
            max_age_secs: config.max_age_secs,
            secure: config.cookie_secure,
            rotate_on_success: config.rotate_on_success,
            exempt_paths: config
                .exempt_paths
                .iter()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether `path` skips verification.
    ///
    /// The path is compared after trimming slashes and one `api/` prefix;
    /// an entry matches itself and anything below it on a `/` boundary.
    pub fn is_exempt(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.exempt_paths.iter().any(|exempt| {
            path == exempt.as_str()
                || path
                    .strip_prefix(exempt.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Build the token cookie
    pub fn cookie(&self, token: String, http_only: bool) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.max_age_secs))
            .build()
    }

    fn cookie_token(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn header_token(&self, request: &Request<Body>) -> Option<String> {
        request
            .headers()
            .get_all(self.header_name.as_str())
            .iter()
            .next()
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl Default for CsrfPolicy {
    fn default() -> Self {
        Self::from_config(&CsrfConfig::default())
    }
}

/// Generate a new random token (32 bytes, hex encoded)
pub fn generate_token() -> String {
    random_hex(TOKEN_BYTES)
}

fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_matches('/');
    if trimmed == "api" {
        return "";
    }
    trimmed.strip_prefix("api/").unwrap_or(trimmed)
}

fn tokens_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// CSRF middleware
pub async fn csrf_layer(
    State(policy): State<Arc<CsrfPolicy>>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::GET {
        let has_cookie = policy.cookie_token(&jar).is_some();
        let response = next.run(request).await;

        if has_cookie || response.extensions().get::<IssuedCsrfToken>().is_some() {
            return response;
        }
        let cookie = policy.cookie(generate_token(), false);
        return (jar.add(cookie), response).into_response();
    }

    let path = request.uri().path().to_string();
    if policy.is_exempt(&path) {
        return next.run(request).await;
    }

    let (Some(cookie_token), Some(header_token)) =
        (policy.cookie_token(&jar), policy.header_token(&request))
    else {
        tracing::warn!("CSRF token missing: {} {}", request.method(), path);
        return AppError::CsrfTokenMissing.into_response();
    };

    if !tokens_match(&cookie_token, &header_token) {
        tracing::warn!("CSRF token mismatch: {} {}", request.method(), path);
        return AppError::CsrfTokenInvalid.into_response();
    }

    if !policy.rotate_on_success {
        return next.run(request).await;
    }

    let rotated = policy.cookie(generate_token(), true);
    let response = next.run(request).await;
    (jar.add(rotated), response).into_response()
}
