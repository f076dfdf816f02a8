//! Organization handlers

use std::collections::HashSet;

use axum::{extract::State, http::StatusCode, response::Json, Extension};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entity::op_log::OpType;
use crate::entity::{department, organization};
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::LogEntry;
use crate::handlers::department::DepartmentResponse;
use crate::middleware::auth::RequestContext;
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(min = 1, max = 16, message = "postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 255))]
    pub line: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitialDepartment {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

/// Create organization request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: AddressInput,
    #[serde(default)]
    #[validate(nested)]
    pub departments: Vec<InitialDepartment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: AddressInput,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub departments: Vec<DepartmentResponse>,
}

impl From<organization::Model> for OrganizationResponse {
    fn from(m: organization::Model) -> Self {
        Self {
            id: m.id,
            code: m.code,
            name: m.name,
            phone: m.phone,
            address: AddressInput {
                postal_code: m.postal_code,
                line: m.address_line,
            },
            created_at: m.created_at,
            departments: Vec::new(),
        }
    }
}

/// First repeated department name, if any
fn duplicate_name(departments: &[InitialDepartment]) -> Option<&str> {
    let mut seen = HashSet::new();
    departments
        .iter()
        .map(|d| d.name.as_str())
        .find(|name| !seen.insert(*name))
}

/// GET /api/organizations
pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> AppResult<Json<ApiResponse<Vec<OrganizationResponse>>>> {
    let orgs = organization::Entity::find()
        .filter(organization::Column::TenantId.eq(ctx.tenant_id))
        .order_by_asc(organization::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(
        orgs.into_iter().map(OrganizationResponse::from).collect(),
    )))
}

/// POST /api/organizations
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidatedJson(req): ValidatedJson<CreateOrganizationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrganizationResponse>>)> {
    ctx.require_admin()?;

    if let Some(name) = duplicate_name(&req.departments) {
        return Err(AppError::Conflict(format!(
            "Department '{}' is listed twice",
            name
        )));
    }

    let existing = organization::Entity::find()
        .filter(organization::Column::TenantId.eq(ctx.tenant_id))
        .filter(organization::Column::Code.eq(&req.code))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Organization code '{}' already exists",
            req.code
        )));
    }

    let txn = state.db.begin().await?;

    let org = organization::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        code: Set(req.code),
        name: Set(req.name),
        postal_code: Set(req.address.postal_code),
        address_line: Set(req.address.line),
        phone: Set(req.phone),
        created_at: Set(chrono::Utc::now().timestamp()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut departments = Vec::with_capacity(req.departments.len());
    for d in req.departments {
        let dept = department::ActiveModel {
            tenant_id: Set(ctx.tenant_id),
            organization_id: Set(org.id),
            parent_id: Set(0),
            name: Set(d.name),
            code: Set(d.code),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        departments.push(DepartmentResponse::from(dept));
    }

    txn.commit().await?;

    tracing::info!("Organization created: {} by {}", org.code, ctx.username);
    state.audit.record(
        LogEntry::new(ctx.tenant_id, &ctx.username, OpType::CreateOrganization)
            .desc(format!("organization: {} ({} departments)", org.code, departments.len())),
    );

    let mut response = OrganizationResponse::from(org);
    response.departments = departments;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}
