use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};

use proventory_audit::AuditAction;
use proventory_infra::tables;
use proventory_purchasing::{WorkflowConfig, WorkflowModule};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized};
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/:module", get(get_workflow).put(put_workflow))
}

pub async fn get_workflow(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(module): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_READ])).await?;
    let module: WorkflowModule = module.parse()?;
    common::ok(services.repos.workflows.get(tenant.tenant_id(), module).await?)
}

/// Replace the approval levels of a module.
///
/// Documents already in approval are decided against the new levels.
pub async fn put_workflow(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(module): Path<String>,
    Json(body): Json<dto::WorkflowRequest>,
) -> ApiResult {
    let (req, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::WORKFLOWS_MANAGE])).await?;
    let module: WorkflowModule = module.parse()?;
    let tenant_id = tenant.tenant_id();

    let config = WorkflowConfig::new(module, req.levels)?;
    let before = services.repos.workflows.get(tenant_id, module).await?;
    let stored = services.repos.workflows.put(tenant_id, &config).await?;
    services
        .audit(&tenant, &principal, AuditAction::Update, tables::WORKFLOWS, module.as_str(), Some(&before), Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant_id, module = module.as_str(), levels = stored.levels().len(), "workflow updated");
    common::ok(stored)
}
