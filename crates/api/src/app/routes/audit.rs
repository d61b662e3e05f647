use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Router,
};

use proventory_audit::AuditFilter;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized};
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", get(list_audit))
}

/// Audit log, newest first, with the changed columns of each entry.
pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AuditQuery>,
) -> ApiResult {
    let (query, _) = authorized(&services, &tenant, &principal, CmdAuth::new(query, &[perms::AUDIT_READ])).await?;
    let filter: AuditFilter = query.into();
    filter.validate()?;

    let entries = services.repos.audit.list(tenant.tenant_id()).await?;
    let rows: Vec<_> = filter
        .apply(&entries)
        .into_iter()
        .map(|e| {
            let mut row = serde_json::to_value(e).unwrap_or_default();
            row["changed_fields"] = serde_json::json!(e.changed_fields());
            row
        })
        .collect();
    common::list(rows)
}
