//! Purchase returns against received orders.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use proventory_audit::AuditAction;
use proventory_core::DomainError;
use proventory_infra::{BackendError, Query as BackendQuery, tables};
use proventory_inventory::{AdjustStock, ItemId};
use proventory_notifications::NotificationKind;
use proventory_purchasing::{
    CreatePurchaseReturn, DocumentKind, PurchaseReturn, PurchaseReturnId, WorkflowModule, next_document_number,
};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized, parse_id};
use crate::app::routes::inventory::notify_if_low;
use crate::app::routes::purchases::{Decided, NUMBERING_ATTEMPTS, approver, pending_level};
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_return).get(list_returns))
        .route("/:id", get(get_return))
        .route("/:id/decision", post(decide_return))
        .route("/:id/approvals", get(return_approvals))
}

async fn load_return(services: &AppServices, tenant: &TenantContext, id: &str) -> ApiResult<PurchaseReturn> {
    let id: PurchaseReturnId = parse_id(id)?;
    Ok(services.repos.returns.get(tenant.tenant_id(), &id).await?)
}

pub async fn create_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreatePurchaseReturn>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::PURCHASES_WRITE])).await?;
    let tenant_id = tenant.tenant_id();
    let now = Utc::now();

    let order = services.repos.orders.get(tenant_id, &cmd.order_id).await?;
    let existing = services.repos.returns.list(tenant_id).await?;
    let number = next_document_number(
        DocumentKind::PurchaseReturn,
        now.date_naive(),
        existing.iter().map(|r| r.return_number.as_str()),
    );

    let author = principal.display_name();
    let mut ret = PurchaseReturn::create(tenant_id, number, &order, &existing, cmd, (principal.user_id(), &author), now)?;
    let mut attempt = 1;
    let stored = loop {
        match services.repos.returns.insert(&ret).await {
            Ok(stored) => break stored,
            Err(BackendError::Conflict(reason)) if attempt < NUMBERING_ATTEMPTS => {
                tracing::debug!(tenant_id = %tenant_id, return_number = %ret.return_number, %reason, "document number taken, renumbering");
                attempt += 1;
                let existing = services.repos.returns.list(tenant_id).await?;
                ret.return_number = next_document_number(
                    DocumentKind::PurchaseReturn,
                    now.date_naive(),
                    existing.iter().map(|r| r.return_number.as_str()),
                );
            }
            Err(e) => return Err(e.into()),
        }
    };
    services
        .audit(&tenant, &principal, AuditAction::Insert, tables::PURCHASE_RETURNS, stored.id, None, Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant_id, return_number = %stored.return_number, "purchase return created");

    let config = services.repos.workflows.get(tenant_id, WorkflowModule::PurchaseReturn).await?;
    common::created(dto::return_to_json(&stored, &config))
}

pub async fn list_returns(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ReturnListQuery>,
) -> ApiResult {
    let (query, _) = authorized(&services, &tenant, &principal, CmdAuth::new(query, &[perms::PURCHASES_READ])).await?;
    let tenant_id = tenant.tenant_id();

    let mut backend_query = BackendQuery::new().order_desc("created_at");
    if let Some(status) = query.status {
        let status = serde_json::to_value(status).map_err(|e| DomainError::validation(e.to_string()))?;
        backend_query = backend_query.eq("status", status.as_str().unwrap_or_default());
    }
    let returns = services.repos.returns.find(tenant_id, &backend_query).await?;
    let config = services.repos.workflows.get(tenant_id, WorkflowModule::PurchaseReturn).await?;
    common::list(returns.iter().map(|r| dto::return_to_json(r, &config)).collect())
}

pub async fn get_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_READ])).await?;
    let ret = load_return(&services, &tenant, &id).await?;
    let config = services
        .repos
        .workflows
        .get(tenant.tenant_id(), WorkflowModule::PurchaseReturn)
        .await?;
    common::ok(dto::return_to_json(&ret, &config))
}

pub async fn return_approvals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_READ])).await?;
    let ret = load_return(&services, &tenant, &id).await?;
    common::list(ret.approvals())
}

/// Decide at a level; an approval that completes the workflow takes the goods out of stock.
pub async fn decide_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DecisionRequest>,
) -> ApiResult {
    let (req, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::PURCHASES_READ])).await?;
    let tenant_id = tenant.tenant_id();
    let now = Utc::now();

    let before = load_return(&services, &tenant, &id).await?;
    let config = services.repos.workflows.get(tenant_id, WorkflowModule::PurchaseReturn).await?;

    let mut ret = before.clone();
    let decided = match ret.settle(&config, now)? {
        Some(outcome) => Decided::settled(outcome),
        None => {
            let level = pending_level(req.level, &before.approval_steps, &config)?;
            let outcome = ret.decide(&config, level, req.decision, &approver(&principal), req.comment, now)?;
            Decided::at(level, req.decision, outcome)
        }
    };
    let outcome = decided.outcome;

    // Stock must be able to absorb the return before anything is written.
    let mut deltas: BTreeMap<ItemId, i64> = BTreeMap::new();
    for (item_id, delta) in ret.stock_movements() {
        *deltas.entry(item_id).or_default() += delta;
    }
    let mut moved = Vec::new();
    for (item_id, delta) in deltas {
        let old = services.repos.items.get(tenant_id, &item_id).await?;
        let mut new = old.clone();
        new.adjust(
            &AdjustStock {
                delta,
                reason: Some(format!("returned on {}", ret.return_number)),
            },
            now,
        )?;
        moved.push((old, new));
    }

    // Stock first, so an approved return is never stored without its movements.
    for (old, new) in &moved {
        let saved = services.repos.items.save(new).await?;
        services
            .audit(&tenant, &principal, AuditAction::Update, tables::ITEMS, saved.id, Some(old), Some(&saved))
            .await;
        notify_if_low(&services, tenant_id, &principal, old, &saved).await;
    }

    let stored = services.repos.returns.save(&ret).await?;
    services
        .audit(&tenant, &principal, decided.action(), tables::PURCHASE_RETURNS, stored.id, Some(&before), Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant_id, return_number = %stored.return_number, level = ?decided.level, ?outcome, "purchase return decision recorded");

    if let Some(verdict) = decided.verdict() {
        services
            .notify(
                tenant_id,
                stored.created_by,
                NotificationKind::ApprovalDecided,
                format!("Purchase return {} {verdict}", stored.return_number),
                decided.describe(&principal),
                Some(format!("/purchases/returns/{}", stored.id)),
            )
            .await;
    }

    let mut body = dto::return_to_json(&stored, &config);
    body["outcome"] = dto::outcome_to_json(outcome);
    common::ok(body)
}
