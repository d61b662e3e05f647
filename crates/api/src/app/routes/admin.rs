//! Tenant role management.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;

use proventory_audit::AuditAction;
use proventory_auth::{Permission, Role, RoleRecord, RoleRecordId};
use proventory_core::DomainError;
use proventory_infra::tables;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized, parse_id};
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", put(update_role).delete(delete_role))
}

fn permissions(raw: Vec<String>) -> impl Iterator<Item = Permission> {
    raw.into_iter().map(Permission::new)
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::ROLES_MANAGE])).await?;
    let mut roles = services.repos.roles.list(tenant.tenant_id()).await?;
    roles.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
    common::list(roles)
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RoleRequest>,
) -> ApiResult {
    let (req, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::ROLES_MANAGE])).await?;
    let tenant_id = tenant.tenant_id();

    let role = Role::new(req.name.trim().to_string());
    if role.is_admin() {
        return Err(DomainError::conflict("the admin role is built in").into());
    }
    let record = RoleRecord::new(tenant_id, role, req.description, permissions(req.permissions), Utc::now())?;
    let existing = services.repos.roles.list(tenant_id).await?;
    if existing.iter().any(|r| r.name == record.name) {
        return Err(DomainError::conflict(format!("role '{}' already exists", record.name.as_str())).into());
    }

    let stored = services.repos.roles.insert(&record).await?;
    services.sessions.invalidate_tenant(tenant_id);
    services
        .audit(&tenant, &principal, AuditAction::Insert, tables::ROLES, stored.id, None, Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant_id, role = stored.name.as_str(), "role created");
    common::created(stored)
}

/// Replace a role's description and permission set. The name is fixed.
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RoleRequest>,
) -> ApiResult {
    let (req, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::ROLES_MANAGE])).await?;
    let id: RoleRecordId = parse_id(&id)?;
    let tenant_id = tenant.tenant_id();

    let before = services.repos.roles.get(tenant_id, &id).await?;
    if req.name.trim() != before.name.as_str() {
        return Err(DomainError::validation("roles cannot be renamed").into());
    }
    let mut record = before.clone();
    record.description = req.description;
    record.set_permissions(permissions(req.permissions), Utc::now())?;

    let stored = services.repos.roles.save(&record).await?;
    services.sessions.invalidate_tenant(tenant_id);
    services
        .audit(&tenant, &principal, AuditAction::Update, tables::ROLES, id, Some(&before), Some(&stored))
        .await;
    common::ok(stored)
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::ROLES_MANAGE])).await?;
    let id: RoleRecordId = parse_id(&id)?;
    let tenant_id = tenant.tenant_id();

    let record = services.repos.roles.get(tenant_id, &id).await?;
    if record.name.is_admin() {
        return Err(DomainError::invariant("the admin role cannot be deleted").into());
    }
    services.repos.roles.delete(tenant_id, &id).await?;
    services.sessions.invalidate_tenant(tenant_id);
    services
        .audit(&tenant, &principal, AuditAction::Delete, tables::ROLES, id, Some(&record), None)
        .await;
    Ok(StatusCode::NO_CONTENT.into_response())
}
