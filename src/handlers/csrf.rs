//! CSRF token issuance

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::middleware::csrf::{generate_token, IssuedCsrfToken};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub token: String,
}

/// GET /api/csrf/token
/// Returns `{ token }` directly and sets the script-readable cookie
pub async fn issue_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = generate_token();
    let cookie = state.csrf.cookie(token.clone(), false);

    let mut response = (
        jar.add(cookie),
        Json(CsrfTokenResponse {
            token: token.clone(),
        }),
    )
        .into_response();
    response.extensions_mut().insert(IssuedCsrfToken(token));
    response
}
