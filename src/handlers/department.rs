//! Department handlers
//!
//! Implements tenant-scoped department CRUD operations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entity::op_log::OpType;
use crate::entity::{department, organization};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::LogEntry;
use crate::middleware::auth::RequestContext;
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// Create department request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartmentRequest {
    #[validate(range(min = 1, message = "organizationId is required"))]
    pub organization_id: i64,
    #[serde(default)]
    pub parent_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

/// Update department request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartmentRequest {
    pub parent_id: Option<i64>,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

/// Department response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentResponse {
    pub id: i64,
    pub organization_id: i64,
    pub parent_id: i64,
    pub name: String,
    pub code: String,
}

impl From<department::Model> for DepartmentResponse {
    fn from(m: department::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            parent_id: m.parent_id,
            name: m.name,
            code: m.code,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentQuery {
    pub organization_id: Option<i64>,
}

/// Organization must exist inside the caller's tenant
pub(crate) async fn ensure_organization<C: ConnectionTrait>(
    db: &C,
    tenant_id: i64,
    organization_id: i64,
) -> AppResult<organization::Model> {
    organization::Entity::find_by_id(organization_id)
        .filter(organization::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or_not_found("Organization not found")
}

async fn find_department<C: ConnectionTrait>(
    db: &C,
    tenant_id: i64,
    id: i64,
) -> AppResult<department::Model> {
    department::Entity::find_by_id(id)
        .filter(department::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or_not_found("Department not found")
}

/// Reject a name already used by a sibling under the same parent
pub(crate) async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    parent_id: i64,
    name: &str,
    exclude_id: Option<i64>,
) -> AppResult<()> {
    let mut query = department::Entity::find()
        .filter(department::Column::OrganizationId.eq(organization_id))
        .filter(department::Column::ParentId.eq(parent_id))
        .filter(department::Column::Name.eq(name));
    if let Some(id) = exclude_id {
        query = query.filter(department::Column::Id.ne(id));
    }

    if query.one(db).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Department '{}' already exists",
            name
        )));
    }
    Ok(())
}

/// A parent must be a department of the same organization
async fn ensure_parent<C: ConnectionTrait>(
    db: &C,
    tenant_id: i64,
    organization_id: i64,
    parent_id: i64,
) -> AppResult<()> {
    if parent_id == 0 {
        return Ok(());
    }
    let parent = find_department(db, tenant_id, parent_id).await?;
    if parent.organization_id != organization_id {
        return Err(AppError::BadRequest(
            "Parent department belongs to another organization".to_string(),
        ));
    }
    Ok(())
}

/// True when `candidate` is `id` itself or one of its descendants
fn creates_cycle(departments: &[department::Model], id: i64, candidate: i64) -> bool {
    let mut current = candidate;
    // Bounded walk guards against corrupt data that already loops
    for _ in 0..=departments.len() {
        if current == 0 {
            return false;
        }
        if current == id {
            return true;
        }
        current = match departments.iter().find(|d| d.id == current) {
            Some(d) => d.parent_id,
            None => return false,
        };
    }
    true
}

/// GET /api/departments
pub async fn list_departments(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<DepartmentQuery>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentResponse>>>> {
    let mut select = department::Entity::find().filter(department::Column::TenantId.eq(ctx.tenant_id));
    if let Some(org_id) = query.organization_id {
        select = select.filter(department::Column::OrganizationId.eq(org_id));
    }

    let depts = select
        .order_by_asc(department::Column::ParentId)
        .order_by_asc(department::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(
        depts.into_iter().map(DepartmentResponse::from).collect(),
    )))
}

/// POST /api/departments
pub async fn create_department(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidatedJson(req): ValidatedJson<CreateDepartmentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<DepartmentResponse>>)> {
    ctx.require_admin()?;

    ensure_organization(&state.db, ctx.tenant_id, req.organization_id).await?;
    ensure_parent(&state.db, ctx.tenant_id, req.organization_id, req.parent_id).await?;
    ensure_unique_name(&state.db, req.organization_id, req.parent_id, &req.name, None).await?;

    let dept = department::ActiveModel {
        tenant_id: Set(ctx.tenant_id),
        organization_id: Set(req.organization_id),
        parent_id: Set(req.parent_id),
        name: Set(req.name),
        code: Set(req.code),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Department created: {} by {}", dept.name, ctx.username);
    state.audit.record(
        LogEntry::new(ctx.tenant_id, &ctx.username, OpType::CreateDept)
            .desc(format!("department: {}", dept.name)),
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(dept.into()))))
}

/// PUT /api/departments/:id
pub async fn update_department(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateDepartmentRequest>,
) -> AppResult<Json<ApiResponse<DepartmentResponse>>> {
    ctx.require_admin()?;

    let dept = find_department(&state.db, ctx.tenant_id, id).await?;
    let parent_id = req.parent_id.unwrap_or(dept.parent_id);

    if parent_id != dept.parent_id {
        ensure_parent(&state.db, ctx.tenant_id, dept.organization_id, parent_id).await?;
        let siblings = department::Entity::find()
            .filter(department::Column::OrganizationId.eq(dept.organization_id))
            .all(&state.db)
            .await?;
        if creates_cycle(&siblings, id, parent_id) {
            return Err(AppError::BadRequest(
                "A department cannot be moved under itself".to_string(),
            ));
        }
    }
    ensure_unique_name(&state.db, dept.organization_id, parent_id, &req.name, Some(id)).await?;

    let mut active: department::ActiveModel = dept.into();
    active.parent_id = Set(parent_id);
    active.name = Set(req.name);
    active.code = Set(req.code);
    let dept = active.update(&state.db).await?;

    state.audit.record(
        LogEntry::new(ctx.tenant_id, &ctx.username, OpType::UpdateDept)
            .desc(format!("department: {}", dept.name)),
    );

    Ok(Json(ApiResponse::success(dept.into())))
}

/// DELETE /api/departments/:id
pub async fn delete_department(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    ctx.require_admin()?;

    let dept = find_department(&state.db, ctx.tenant_id, id).await?;

    let children = department::Entity::find()
        .filter(department::Column::ParentId.eq(id))
        .count(&state.db)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict(
            "Department has sub-departments and cannot be deleted".to_string(),
        ));
    }

    department::Entity::delete_by_id(id).exec(&state.db).await?;

    state.audit.record(
        LogEntry::new(ctx.tenant_id, &ctx.username, OpType::DeleteDept)
            .desc(format!("department: {}", dept.name)),
    );

    Ok(Json(ApiResponse::success_msg("Department deleted")))
}
