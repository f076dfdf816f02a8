//! Azure AD single sign-on administration
//!
//! One configuration row per tenant. The client secret is write-only: reads
//! return a masked value, and an update without a secret keeps the stored
//! one.

use axum::{extract::State, http::HeaderMap, response::Json, Extension};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::config::SsoConfig;
use crate::entity::op_log::OpType;
use crate::entity::sso_config::{self, PROVIDER_AZURE_AD};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::{client_ip, LogEntry};
use crate::middleware::auth::RequestContext;
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::validation::{FieldErrors, ValidatedJson};

const SECRET_MASK: &str = "********";

fn validate_guid(value: &str) -> Result<(), ValidationError> {
    uuid::Uuid::parse_str(value).map(|_| ()).map_err(|_| {
        let mut error = ValidationError::new("guid");
        error.message = Some("must be a GUID".into());
        error
    })
}

/// PUT body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSsoRequest {
    #[validate(custom(function = "validate_guid"))]
    pub azure_tenant_id: String,
    #[validate(custom(function = "validate_guid"))]
    pub client_id: String,
    #[validate(length(min = 1, max = 255))]
    pub client_secret: Option<String>,
    #[validate(url, length(max = 255))]
    pub redirect_uri: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoConfigResponse {
    pub provider: String,
    pub azure_tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub enabled: bool,
    pub updated_at: i64,
}

impl From<sso_config::Model> for SsoConfigResponse {
    fn from(m: sso_config::Model) -> Self {
        Self {
            client_secret: mask_secret(&m.client_secret),
            provider: m.provider,
            azure_tenant_id: m.azure_tenant_id,
            client_id: m.client_id,
            redirect_uri: m.redirect_uri,
            enabled: m.enabled,
            updated_at: m.updated_at,
        }
    }
}

/// Connection test report
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SsoTestResult {
    pub success: bool,
    pub message: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

/// Subset of the OpenID Connect discovery document
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: Option<String>,
}

/// Keep the last four characters of long secrets
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        String::new()
    } else if count <= 8 {
        SECRET_MASK.to_string()
    } else {
        let tail: String = secret.chars().skip(count - 4).collect();
        format!("{}{}", SECRET_MASK, tail)
    }
}

pub fn discovery_url(config: &SsoConfig, azure_tenant_id: &str) -> String {
    format!(
        "{}/{}/v2.0/.well-known/openid-configuration",
        config.authority_host.trim_end_matches('/'),
        azure_tenant_id
    )
}

/// Endpoints reported when discovery is unavailable
pub fn default_endpoints(config: &SsoConfig, azure_tenant_id: &str, message: String) -> SsoTestResult {
    let base = format!(
        "{}/{}/oauth2/v2.0",
        config.authority_host.trim_end_matches('/'),
        azure_tenant_id
    );
    SsoTestResult {
        success: false,
        message,
        authorization_endpoint: format!("{}/authorize", base),
        token_endpoint: format!("{}/token", base),
        userinfo_endpoint: config.userinfo_endpoint.clone(),
    }
}

async fn find_config(state: &AppState, tenant_id: i64) -> AppResult<Option<sso_config::Model>> {
    Ok(sso_config::Entity::find()
        .filter(sso_config::Column::TenantId.eq(tenant_id))
        .filter(sso_config::Column::Provider.eq(PROVIDER_AZURE_AD))
        .one(&state.db)
        .await?)
}

/// GET /api/sso/azure-ad
pub async fn get_azure_ad(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<Json<ApiResponse<SsoConfigResponse>>> {
    ctx.require_admin()?;

    let config = find_config(&state, ctx.tenant_id)
        .await?
        .ok_or_not_found("Azure AD is not configured")?;

    Ok(Json(ApiResponse::success(config.into())))
}

/// PUT /api/sso/azure-ad
pub async fn put_azure_ad(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<UpdateSsoRequest>,
) -> AppResult<Json<ApiResponse<SsoConfigResponse>>> {
    ctx.require_admin()?;

    let now = chrono::Utc::now().timestamp();
    let saved = match find_config(&state, ctx.tenant_id).await? {
        Some(existing) => {
            let mut active: sso_config::ActiveModel = existing.into();
            active.azure_tenant_id = Set(req.azure_tenant_id);
            active.client_id = Set(req.client_id);
            if let Some(secret) = req.client_secret {
                active.client_secret = Set(secret);
            }
            active.redirect_uri = Set(req.redirect_uri);
            active.enabled = Set(req.enabled);
            active.updated_at = Set(now);
            active.update(&state.db).await?
        }
        None => {
            let Some(secret) = req.client_secret else {
                let mut fields = FieldErrors::new();
                fields.insert(
                    "clientSecret".to_string(),
                    vec!["is required".to_string()],
                );
                return Err(AppError::Validation(fields));
            };
            sso_config::ActiveModel {
                tenant_id: Set(ctx.tenant_id),
                provider: Set(PROVIDER_AZURE_AD.to_string()),
                azure_tenant_id: Set(req.azure_tenant_id),
                client_id: Set(req.client_id),
                client_secret: Set(secret),
                redirect_uri: Set(req.redirect_uri),
                enabled: Set(req.enabled),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&state.db)
            .await?
        }
    };

    tracing::info!("Azure AD settings updated by {}", ctx.username);
    state.audit.record(
        LogEntry::new(ctx.tenant_id, &ctx.username, OpType::UpdateSso)
            .desc(format!("enabled: {}", saved.enabled))
            .ip(client_ip(&headers)),
    );

    Ok(Json(ApiResponse::success(saved.into())))
}

/// Fetch the discovery document and report the advertised endpoints
async fn fetch_discovery(state: &AppState, azure_tenant_id: &str) -> SsoTestResult {
    let url = discovery_url(&state.config.sso, azure_tenant_id);
    tracing::debug!("Fetching OpenID configuration: {}", url);

    let response = match state.http.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            return default_endpoints(
                &state.config.sso,
                azure_tenant_id,
                format!("Could not reach identity provider: {}", e),
            )
        }
    };

    if !response.status().is_success() {
        return default_endpoints(
            &state.config.sso,
            azure_tenant_id,
            format!("Identity provider returned HTTP {}", response.status().as_u16()),
        );
    }

    match response.json::<DiscoveryDocument>().await {
        Ok(doc) => SsoTestResult {
            success: true,
            message: "Connection successful".to_string(),
            authorization_endpoint: doc.authorization_endpoint,
            token_endpoint: doc.token_endpoint,
            userinfo_endpoint: doc
                .userinfo_endpoint
                .unwrap_or_else(|| state.config.sso.userinfo_endpoint.clone()),
        },
        Err(e) => default_endpoints(
            &state.config.sso,
            azure_tenant_id,
            format!("Invalid discovery document: {}", e),
        ),
    }
}

/// POST /api/sso/azure-ad/test
pub async fn test_azure_ad(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<Json<ApiResponse<SsoTestResult>>> {
    ctx.require_admin()?;

    let config = find_config(&state, ctx.tenant_id)
        .await?
        .ok_or_not_found("Azure AD is not configured")?;

    let result = fetch_discovery(&state, &config.azure_tenant_id).await;
    if !result.success {
        tracing::warn!("Azure AD test failed for tenant {}: {}", ctx.tenant_id, result.message);
    }

    let mut entry = LogEntry::new(ctx.tenant_id, &ctx.username, OpType::TestSso)
        .desc(result.message.clone());
    if !result.success {
        entry = entry.failed();
    }
    state.audit.record(entry);

    Ok(Json(ApiResponse::success(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::validation::flatten_errors;

    const TENANT: &str = "72f988bf-86f1-41af-91ab-2d7cd011db47";

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("short"), "********");
        assert_eq!(mask_secret("abcdefghijkl"), "********ijkl");
    }

    #[test]
    fn test_response_masks_secret() {
        let model = sso_config::Model {
            id: 1,
            tenant_id: 1,
            provider: PROVIDER_AZURE_AD.to_string(),
            azure_tenant_id: TENANT.to_string(),
            client_id: TENANT.to_string(),
            client_secret: "super-secret-value".to_string(),
            redirect_uri: "https://erp.example.com/sso/callback".to_string(),
            enabled: true,
            updated_at: 0,
        };
        let json = serde_json::to_value(SsoConfigResponse::from(model)).unwrap();
        assert_eq!(json["clientSecret"], "********alue");
        assert_eq!(json["azureTenantId"], TENANT);
    }

    #[test]
    fn test_discovery_and_default_endpoints() {
        let sso = Config::default().sso;
        assert_eq!(
            discovery_url(&sso, TENANT),
            format!(
                "https://login.microsoftonline.com/{}/v2.0/.well-known/openid-configuration",
                TENANT
            )
        );

        let result = default_endpoints(&sso, TENANT, "offline".to_string());
        assert!(!result.success);
        assert_eq!(
            result.authorization_endpoint,
            format!("https://login.microsoftonline.com/{}/oauth2/v2.0/authorize", TENANT)
        );
        assert_eq!(
            result.token_endpoint,
            format!("https://login.microsoftonline.com/{}/oauth2/v2.0/token", TENANT)
        );
        assert_eq!(result.userinfo_endpoint, "https://graph.microsoft.com/oidc/userinfo");
    }

    #[test]
    fn test_update_request_validation() {
        let req: UpdateSsoRequest = serde_json::from_str(
            r#"{"azureTenantId":"contoso","clientId":"72f988bf-86f1-41af-91ab-2d7cd011db47","redirectUri":"not a url"}"#,
        )
        .unwrap();
        let errors = flatten_errors(&req.validate().unwrap_err());
        assert_eq!(errors["azureTenantId"], vec!["must be a GUID".to_string()]);
        assert!(errors.contains_key("redirectUri"));
        assert!(!errors.contains_key("clientId"));
        assert!(!errors.contains_key("clientSecret"));
    }

    #[test]
    fn test_test_result_serializes_camel_case() {
        let sso = Config::default().sso;
        let json = serde_json::to_value(default_endpoints(&sso, TENANT, "x".into())).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["authorizationEndpoint"].is_string());
        assert!(json["userinfoEndpoint"].is_string());
    }
}
