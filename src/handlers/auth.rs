//! Authentication handlers
//!
//! Implements login, refresh, logout, and profile endpoints. The access
//! JWT and the opaque refresh token both travel in HttpOnly cookies; only
//! the SHA-256 of a refresh token is stored.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::AuthConfig;
use crate::entity::emp_account::{self, AccountStatus};
use crate::entity::op_log::OpType;
use crate::entity::refresh_token;
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::{client_ip, LogEntry};
use crate::jwt;
use crate::middleware::auth::{RequestContext, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::routes::ApiResponse;
use crate::session::channel::SyncMessage;
use crate::state::AppState;
use crate::token::{random_hex, sha256_hex};
use crate::validation::ValidatedJson;

/// Refresh cookie is only sent to the auth endpoints
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

const REFRESH_TOKEN_BYTES: usize = 32;

/// Login request body
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "password is required"))]
    pub password: String,
}

/// Account as returned to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: i64,
    pub tenant_id: i64,
    pub organization_id: i64,
    pub department_id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
    pub status: i32,
    pub last_login: i64,
}

impl From<emp_account::Model> for AccountResponse {
    fn from(m: emp_account::Model) -> Self {
        Self {
            id: m.id,
            tenant_id: m.tenant_id,
            organization_id: m.organization_id,
            department_id: m.department_id,
            username: m.username,
            full_name: m.full_name,
            email: m.email,
            role: m.role,
            status: m.status,
            last_login: m.last_login,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: AccountResponse,
}

fn session_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Remove both session cookies
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH))
}

/// Mint an access/refresh pair and attach both cookies
async fn issue_session(
    db: &DatabaseConnection,
    config: &AuthConfig,
    jar: CookieJar,
    account: &emp_account::Model,
) -> AppResult<CookieJar> {
    let now = chrono::Utc::now().timestamp();

    let claims = jwt::Claims::for_account(account, now, config.access_ttl_secs);
    let access = jwt::sign(&claims, &config.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))?;

    let refresh = random_hex(REFRESH_TOKEN_BYTES);
    refresh_token::ActiveModel {
        account_id: Set(account.id),
        token_hash: Set(sha256_hex(&refresh)),
        expires_at: Set(now + config.refresh_ttl_secs),
        revoked: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(jar
        .add(session_cookie(
            ACCESS_COOKIE,
            access,
            "/",
            config.access_ttl_secs,
            config.cookie_secure,
        ))
        .add(session_cookie(
            REFRESH_COOKIE,
            refresh,
            REFRESH_COOKIE_PATH,
            config.refresh_ttl_secs,
            config.cookie_secure,
        )))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<ApiResponse<LoginResponse>>)> {
    let ip = client_ip(&headers);

    let account = emp_account::Entity::find()
        .filter(emp_account::Column::Username.eq(&req.username))
        .one(&state.db)
        .await?;

    let Some(account) = account else {
        tracing::warn!("Login failed: account not found - {}", req.username);
        state.audit.record(
            LogEntry::new(0, &req.username, OpType::Login)
                .desc("account not found")
                .failed()
                .ip(ip),
        );
        return Err(AppError::InvalidCredentials);
    };

    let password_valid = bcrypt::verify(&req.password, &account.password).unwrap_or(false);
    if !password_valid {
        tracing::warn!("Login failed: wrong password - {}", req.username);
        state.audit.record(
            LogEntry::new(account.tenant_id, &req.username, OpType::Login)
                .desc("wrong password")
                .failed()
                .ip(ip),
        );
        return Err(AppError::InvalidCredentials);
    }

    if account.account_status() == AccountStatus::Disabled {
        tracing::warn!("Login failed: account disabled - {}", req.username);
        state.audit.record(
            LogEntry::new(account.tenant_id, &req.username, OpType::Login)
                .desc("account disabled")
                .failed()
                .ip(ip),
        );
        return Err(AppError::AccountDisabled);
    }

    // Update last login time and activate on first login
    let mut active: emp_account::ActiveModel = account.into();
    active.last_login = Set(chrono::Utc::now().timestamp());
    active.status = Set(AccountStatus::Active.into());
    let account = active.update(&state.db).await?;

    let jar = issue_session(&state.db, &state.config.auth, jar, &account).await?;

    tracing::info!("Account logged in: {}", account.username);
    state
        .audit
        .record(LogEntry::new(account.tenant_id, &account.username, OpType::Login).ip(ip));

    Ok((
        jar,
        Json(ApiResponse::success(LoginResponse {
            user: account.into(),
        })),
    ))
}

/// Validate and consume a refresh token, returning its account.
///
/// The token is claimed with a single conditional update, so of two
/// concurrent redemptions only one wins.
async fn redeem_refresh_token(db: &DatabaseConnection, token: &str) -> AppResult<emp_account::Model> {
    let now = chrono::Utc::now().timestamp();
    let hash = sha256_hex(token);

    let stored = refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(&hash))
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if stored.revoked {
        // A revoked token came back: treat the whole family as leaked
        tracing::warn!("Reused refresh token for account {}", stored.account_id);
        refresh_token::Entity::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .filter(refresh_token::Column::AccountId.eq(stored.account_id))
            .exec(db)
            .await?;
        return Err(AppError::Unauthorized);
    }
    if !stored.is_usable(now) {
        return Err(AppError::Unauthorized);
    }

    let claimed = refresh_token::Entity::update_many()
        .col_expr(refresh_token::Column::Revoked, Expr::value(true))
        .filter(refresh_token::Column::TokenHash.eq(&hash))
        .filter(refresh_token::Column::Revoked.eq(false))
        .filter(refresh_token::Column::ExpiresAt.gt(now))
        .exec(db)
        .await?;
    if claimed.rows_affected != 1 {
        tracing::debug!("Refresh token for account {} already redeemed", stored.account_id);
        return Err(AppError::Unauthorized);
    }

    let account = emp_account::Entity::find_by_id(stored.account_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if account.account_status() == AccountStatus::Disabled {
        return Err(AppError::AccountDisabled);
    }
    Ok(account)
}

/// POST /api/auth/refresh
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let Some(token) = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
    else {
        return (clear_session(jar), AppError::Unauthorized).into_response();
    };

    let account = match redeem_refresh_token(&state.db, &token).await {
        Ok(account) => account,
        Err(e) => {
            tracing::debug!("Refresh rejected: {}", e);
            state.audit.record(
                LogEntry::new(0, "", OpType::RefreshSession)
                    .desc(e.code())
                    .failed()
                    .ip(client_ip(&headers)),
            );
            return (clear_session(jar), e).into_response();
        }
    };

    match issue_session(&state.db, &state.config.auth, jar.clone(), &account).await {
        Ok(jar) => (
            jar,
            Json(ApiResponse::success(LoginResponse {
                user: account.into(),
            })),
        )
            .into_response(),
        Err(e) => (clear_session(jar), e).into_response(),
    }
}

/// Revoke the presented refresh token and work out whose session ends.
///
/// Revocation goes by token hash alone; without a live access token the
/// token's owner identifies the caller.
async fn end_session(
    db: &DatabaseConnection,
    ctx: Option<RequestContext>,
    refresh: Option<&str>,
) -> AppResult<Option<RequestContext>> {
    let Some(token) = refresh else {
        return Ok(ctx);
    };
    let hash = sha256_hex(token);

    let stored = refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(&hash))
        .one(db)
        .await?;
    let Some(stored) = stored else {
        return Ok(ctx);
    };

    refresh_token::Entity::update_many()
        .col_expr(refresh_token::Column::Revoked, Expr::value(true))
        .filter(refresh_token::Column::TokenHash.eq(&hash))
        .exec(db)
        .await?;

    if ctx.is_some() {
        return Ok(ctx);
    }
    let owner = emp_account::Entity::find_by_id(stored.account_id)
        .one(db)
        .await?;
    Ok(owner.map(|account| RequestContext {
        account_id: account.id,
        tenant_id: account.tenant_id,
        username: account.username,
        role: account.role,
    }))
}

/// POST /api/auth/logout
///
/// Public route: an expired access token must not keep the refresh token
/// alive. Cookies are cleared whatever happens.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ctx: Option<Extension<RequestContext>>,
) -> Response {
    let refresh = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let caller = match end_session(&state.db, ctx.map(|Extension(ctx)| ctx), refresh.as_deref()).await {
        Ok(caller) => caller,
        Err(e) => {
            tracing::error!("Logout failed to revoke refresh token: {}", e);
            return (clear_session(jar), e).into_response();
        }
    };

    match caller {
        Some(ctx) => {
            let notified = state.hub.publish(ctx.account_id, SyncMessage::logout());
            tracing::info!("Account logged out: {} ({} tabs notified)", ctx.username, notified);
            state.audit.record(
                LogEntry::new(ctx.tenant_id, &ctx.username, OpType::Logout).ip(client_ip(&headers)),
            );
        }
        None => tracing::debug!("Logout without a known session"),
    }

    (clear_session(jar), Json(ApiResponse::success_msg("logout success"))).into_response()
}

/// GET /api/auth/profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<Json<ApiResponse<AccountResponse>>> {
    let account = emp_account::Entity::find_by_id(ctx.account_id)
        .filter(emp_account::Column::TenantId.eq(ctx.tenant_id))
        .one(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if account.account_status() == AccountStatus::Disabled {
        return Err(AppError::Unauthorized);
    }

    Ok(Json(ApiResponse::success(account.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use tokio::sync::mpsc;

    use crate::config::Config;
    use crate::handlers::audit::service::AuditSink;
    use crate::session::channel::SyncEvent;

    fn stored_token(revoked: bool, expires_at: i64) -> refresh_token::Model {
        refresh_token::Model {
            id: 11,
            account_id: 4,
            token_hash: sha256_hex("tok"),
            expires_at,
            revoked,
            created_at: 0,
        }
    }

    fn later() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn cookie_jar(cookies: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, cookies.parse().unwrap());
        CookieJar::from_headers(&headers)
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn account() -> emp_account::Model {
        emp_account::Model {
            id: 4,
            tenant_id: 1,
            organization_id: 2,
            department_id: 3,
            username: "carol".to_string(),
            email: None,
            full_name: "Carol".to_string(),
            password: "$2b$12$hash".to_string(),
            role: "approver".to_string(),
            status: 1,
            last_login: 0,
        }
    }

    #[test]
    fn test_account_response_hides_password() {
        let json = serde_json::to_value(AccountResponse::from(account())).unwrap();
        assert_eq!(json["username"], "carol");
        assert_eq!(json["tenantId"], 1);
        assert_eq!(json["fullName"], "Carol");
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_account_response_feeds_client_store() {
        let json = serde_json::to_string(&AccountResponse::from(account())).unwrap();
        let user: crate::session::AuthUser = serde_json::from_str(&json).unwrap();
        assert_eq!(user.id, 4);
        assert_eq!(user.role, "approver");
    }

    #[test]
    fn test_login_request_validation() {
        let req = LoginRequest {
            username: String::new(),
            password: "x".to_string(),
        };
        let errors = crate::validation::flatten_errors(&req.validate().unwrap_err());
        assert_eq!(errors["username"], vec!["username is required".to_string()]);
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie(REFRESH_COOKIE, "abc".to_string(), REFRESH_COOKIE_PATH, 60, true);
        let rendered = cookie.to_string();
        assert!(rendered.starts_with("refresh_token=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Path=/api/auth"));
        assert!(rendered.contains("SameSite=Strict"));
    }

    #[test]
    fn test_clear_session_expires_both_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "access_token=a; refresh_token=b".parse().unwrap(),
        );
        let jar = clear_session(CookieJar::from_headers(&headers));
        assert!(jar.get(ACCESS_COOKIE).is_none());
        assert!(jar.get(REFRESH_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_redeem_claims_token_and_loads_account() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_token(false, later())]])
            .append_exec_results([exec(1)])
            .append_query_results([vec![account()]])
            .into_connection();

        let redeemed = redeem_refresh_token(&db, "tok").await.unwrap();
        assert_eq!(redeemed.id, 4);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 3);
        let claim = format!("{:?}", log[1]);
        assert!(claim.contains("UPDATE"));
        assert!(claim.contains("revoked"));
        assert!(claim.contains("expires_at"));
    }

    #[tokio::test]
    async fn test_redeem_loses_concurrent_claim() {
        // Row looked usable, but another request revoked it first
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_token(false, later())]])
            .append_exec_results([exec(0)])
            .into_connection();

        let err = redeem_refresh_token(&db, "tok").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_redeem_revoked_token_revokes_family() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_token(true, later())]])
            .append_exec_results([exec(3)])
            .into_connection();

        let err = redeem_refresh_token(&db, "tok").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 2);
        assert!(format!("{:?}", log[1]).contains("account_id"));
    }

    #[tokio::test]
    async fn test_redeem_expired_token_is_not_claimed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_token(false, 1)]])
            .into_connection();

        let err = redeem_refresh_token(&db, "tok").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_with_expired_access_token_revokes_and_notifies() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_token(false, later())]])
            .append_exec_results([exec(1)])
            .append_query_results([vec![account()]])
            .into_connection();
        let state = AppState::with_audit(db.clone(), Config::default(), AuditSink::disabled());

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.hub.register(4, tx);

        let response = logout(
            State(state),
            HeaderMap::new(),
            cookie_jar("access_token=expired; refresh_token=tok"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));

        let message = rx.try_recv().unwrap();
        assert_eq!(message.event, SyncEvent::Logout);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 3);
        let revoke = format!("{:?}", log[1]);
        assert!(revoke.contains("token_hash"));
        assert!(!revoke.contains("account_id"));
    }

    #[tokio::test]
    async fn test_logout_clears_cookies_when_revocation_fails() {
        let state = AppState::detached(Config::default());

        let response = logout(
            State(state),
            HeaderMap::new(),
            cookie_jar("refresh_token=tok"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    }
}
