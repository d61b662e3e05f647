//! CSV exports and the per-session print staging area.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use proventory_core::{DomainError, TenantId};
use proventory_parties::PartyKind;
use proventory_reports::{
    items_summary, items_table, orders_table, parties_table, render_html, to_csv, ReportView, StagedReport, Table,
};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized};
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/stage", post(stage_report))
        .route("/staged", get(get_staged).delete(clear_staged))
        .route("/staged/print", get(print_staged))
        .route("/:view", get(export_csv))
}

/// Current rows of a view plus its summary lines.
async fn build_view(services: &AppServices, tenant_id: TenantId, view: ReportView) -> ApiResult<(Table, Vec<String>)> {
    let repos = &services.repos;
    Ok(match view {
        ReportView::Items => {
            let items = repos.items.list(tenant_id).await?;
            (items_table(&items), items_summary(&items))
        }
        ReportView::Suppliers => {
            let parties = repos.suppliers.list(tenant_id).await?;
            (parties_table(PartyKind::Supplier, &parties), vec![format!("Suppliers: {}", parties.len())])
        }
        ReportView::Customers => {
            let parties = repos.customers.list(tenant_id).await?;
            (parties_table(PartyKind::Customer, &parties), vec![format!("Customers: {}", parties.len())])
        }
        ReportView::PurchaseOrders => {
            let orders = repos.orders.list(tenant_id).await?;
            let suppliers = repos.suppliers.list(tenant_id).await?;
            (orders_table(&orders, &suppliers), vec![format!("Orders: {}", orders.len())])
        }
    })
}

pub async fn export_csv(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(view): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::REPORTS_EXPORT])).await?;
    let view: ReportView = view.parse()?;
    let (table, _) = build_view(&services, tenant.tenant_id(), view).await?;
    let body = to_csv(&table)?;

    let disposition = format!("attachment; filename=\"{}.csv\"", view.as_str());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Snapshot a view into the caller's staging slot, replacing any earlier one.
pub async fn stage_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::StageReportRequest>,
) -> ApiResult {
    let (req, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::REPORTS_EXPORT])).await?;
    let view: ReportView = req.view.parse().map_err(|_| DomainError::validation(format!("unknown report view '{}'", req.view)))?;
    let (table, summary) = build_view(&services, tenant.tenant_id(), view).await?;

    let title = req.title.unwrap_or_else(|| view.title().to_string());
    let report = StagedReport::new(title, &table, summary, Utc::now())?;
    let replaced = services.with_print_stage(tenant.tenant_id(), principal.user_id(), |stage| {
        stage.stage(report.clone()).is_some()
    });
    tracing::debug!(view = view.as_str(), rows = report.rows.len(), replaced, "report staged");
    common::created(report)
}

pub async fn get_staged(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let staged = services.with_print_stage(tenant.tenant_id(), principal.user_id(), |stage| stage.current().cloned());
    match staged {
        Some(report) => common::ok(report),
        None => Err(DomainError::not_found().into()),
    }
}

pub async fn print_staged(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let html = services.with_print_stage(tenant.tenant_id(), principal.user_id(), |stage| {
        stage.current().map(render_html)
    });
    match html {
        Some(doc) => Ok(Html(doc).into_response()),
        None => Err(DomainError::not_found().into()),
    }
}

pub async fn clear_staged(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let cleared = services.with_print_stage(tenant.tenant_id(), principal.user_id(), |stage| stage.clear());
    common::ok(serde_json::json!({ "cleared": cleared }))
}
