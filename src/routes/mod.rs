use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::CorsConfig;
use crate::error::AppError;
use crate::handlers;
use crate::middleware::{auth_layer, csrf_layer};
use crate::state::AppState;
use crate::ws;

pub mod health;

/// Success envelope: `{ "status": "success", "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            data: None,
            message: Some(message.into()),
        }
    }
}

fn cors_layer(config: &CorsConfig, csrf_header: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    // Same-origin deployment: no cross-origin access at all
    if origins.is_empty() {
        return CorsLayer::new();
    }

    let mut headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION];
    if let Ok(name) = HeaderName::from_bytes(csrf_header.as_bytes()) {
        headers.push(name);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(headers)
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors, &state.csrf.header_name);

    // API routes
    let api_routes = Router::new()
        // Health check
        .route("/health-check", get(health::health_check))
        // CSRF
        .route("/csrf/token", get(handlers::csrf::issue_token))
        // Auth routes
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/profile", get(handlers::auth::profile))
        // Session sync
        .route("/session/ws", get(ws::serve_ws))
        // Directory routes
        .route(
            "/organizations",
            get(handlers::organization::list_organizations)
                .post(handlers::organization::create_organization),
        )
        .route(
            "/departments",
            get(handlers::department::list_departments)
                .post(handlers::department::create_department),
        )
        .route(
            "/departments/:id",
            put(handlers::department::update_department)
                .delete(handlers::department::delete_department),
        )
        // SSO routes
        .route(
            "/sso/azure-ad",
            get(handlers::sso::get_azure_ad).put(handlers::sso::put_azure_ad),
        )
        .route("/sso/azure-ad/test", post(handlers::sso::test_azure_ad))
        // Audit log routes
        .route("/audit/logs", get(handlers::audit::query_logs));

    // CSRF runs before authentication, so a forged request never reaches auth
    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(middleware::from_fn_with_state(state.csrf.clone(), csrf_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> AppError {
    AppError::NotFound("Not Found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use crate::config::Config;

    fn app() -> Router {
        create_router(AppState::detached(Config::default()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_api_response_envelope() {
        let json = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"][1], 2);
        assert!(json.get("message").is_none());

        let json = serde_json::to_value(ApiResponse::success_msg("done")).unwrap();
        assert_eq!(json["message"], "done");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::get("/api/health-check").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_csrf_token_endpoint_sets_single_readable_cookie() {
        let response = app()
            .oneshot(Request::get("/api/csrf/token").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("csrf_token="));
        assert!(!cookies[0].contains("HttpOnly"));

        let cookie_value = cookies[0]
            .trim_start_matches("csrf_token=")
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let body = body_json(response).await;
        assert_eq!(body["token"], cookie_value);
    }

    #[tokio::test]
    async fn test_post_without_tokens_is_rejected_before_auth() {
        let response = app()
            .oneshot(
                Request::post("/api/departments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "CSRF_TOKEN_MISSING");
    }

    #[tokio::test]
    async fn test_post_with_csrf_but_no_session_is_unauthorized() {
        let response = app()
            .oneshot(
                Request::post("/api/departments")
                    .header(header::COOKIE, "csrf_token=abc123")
                    .header("x-csrf-token", "abc123")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_login_is_csrf_exempt_and_validated() {
        let response = app()
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"","password":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["details"]["username"].is_array());
    }

    #[tokio::test]
    async fn test_login_missing_field_is_validation_error() {
        let response = app()
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"alice"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["password"][0], "is required");
    }

    #[tokio::test]
    async fn test_login_malformed_body_is_bad_request() {
        let response = app()
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_clears_session() {
        let response = app()
            .oneshot(
                Request::post("/api/auth/refresh")
                    .header(header::COOKIE, "access_token=stale; refresh_token=")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    }

    #[tokio::test]
    async fn test_logout_with_stale_access_token_clears_session() {
        let response = app()
            .oneshot(
                Request::post("/api/auth/logout")
                    .header(header::COOKIE, "csrf_token=abc; access_token=stale; refresh_token=")
                    .header("x-csrf-token", "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        let config = CorsConfig {
            allowed_origins: vec!["https://erp.example.com".to_string(), "bad\norigin".to_string()],
        };
        // Builds without panicking on credentials + explicit lists
        let _ = cors_layer(&config, "x-csrf-token");
    }
}
