//! Purchase orders: creation, the approval workflow, issue and receipt.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use proventory_audit::AuditAction;
use proventory_core::{DomainError, TenantId, ValidationErrors};
use proventory_infra::{BackendError, Query as BackendQuery, tables};
use proventory_inventory::{AdjustStock, Item, ItemId};
use proventory_notifications::NotificationKind;
use proventory_purchasing::{
    ApprovalOutcome, ApprovalStep, Approver, CreatePurchaseOrder, Decision, DocumentKind, PurchaseOrder,
    PurchaseOrderId, WorkflowConfig, WorkflowModule, next_document_number, next_pending_level,
};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized, parse_id};
use crate::app::routes::inventory::notify_if_low;
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/submit", post(submit_order))
        .route("/orders/:id/decision", post(decide_order))
        .route("/orders/:id/issue", post(issue_order))
        .route("/orders/:id/receive", post(receive_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/approvals", get(order_approvals))
}

/// Inserts tried per numbered document before a clash is reported as 409.
pub(crate) const NUMBERING_ATTEMPTS: u32 = 3;

pub(crate) fn approver(principal: &PrincipalContext) -> Approver {
    Approver {
        name: principal.display_name(),
        roles: principal.roles().iter().map(|r| r.as_str().to_string()).collect(),
    }
}

/// Every line must reference an existing item.
async fn ensure_items_exist(
    services: &AppServices,
    tenant_id: TenantId,
    item_ids: impl Iterator<Item = ItemId>,
) -> ApiResult<()> {
    let known: BTreeSet<ItemId> = services
        .repos
        .items
        .list(tenant_id)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();
    let mut errors = ValidationErrors::new();
    for (i, id) in item_ids.enumerate() {
        errors.check(!known.contains(&id), &format!("lines[{i}].item_id"), "does not exist");
    }
    Ok(errors.into_result()?)
}

/// Level to decide: the requested one, else the next pending one.
pub(crate) fn pending_level(
    requested: Option<u32>,
    steps: &[ApprovalStep],
    config: &WorkflowConfig,
) -> Result<u32, DomainError> {
    requested
        .or_else(|| next_pending_level(steps, config))
        .ok_or_else(|| DomainError::conflict("no approval level is pending"))
}

/// What a decision request did to a document.
pub(crate) struct Decided {
    /// `None` when the workflow already settled the document and no step was recorded.
    pub level: Option<u32>,
    pub decision: Option<Decision>,
    pub outcome: ApprovalOutcome,
}

impl Decided {
    pub fn at(level: u32, decision: Decision, outcome: ApprovalOutcome) -> Self {
        Self { level: Some(level), decision: Some(decision), outcome }
    }

    pub fn settled(outcome: ApprovalOutcome) -> Self {
        Self { level: None, decision: None, outcome }
    }

    pub fn action(&self) -> AuditAction {
        match (self.decision, self.outcome) {
            (Some(Decision::Reject), _) | (None, ApprovalOutcome::Rejected { .. }) => AuditAction::Reject,
            (Some(Decision::Approve), _) | (None, _) => AuditAction::Approve,
        }
    }

    /// "approved" / "rejected" once the workflow is over.
    pub fn verdict(&self) -> Option<&'static str> {
        match self.outcome {
            ApprovalOutcome::Approved => Some("approved"),
            ApprovalOutcome::Rejected { .. } => Some("rejected"),
            ApprovalOutcome::Pending { .. } => None,
        }
    }

    pub fn describe(&self, principal: &PrincipalContext) -> String {
        match self.level {
            Some(level) => format!("Decided at level {level} by {}", principal.display_name()),
            None => "Completed under the current approval workflow".to_string(),
        }
    }
}

async fn load_order(services: &AppServices, tenant: &TenantContext, id: &str) -> ApiResult<PurchaseOrder> {
    let id: PurchaseOrderId = parse_id(id)?;
    Ok(services.repos.orders.get(tenant.tenant_id(), &id).await?)
}

async fn respond(services: &AppServices, tenant: &TenantContext, order: &PurchaseOrder) -> ApiResult {
    let config = services
        .repos
        .workflows
        .get(tenant.tenant_id(), WorkflowModule::PurchaseOrder)
        .await?;
    common::ok(dto::order_to_json(order, &config))
}

async fn save_with_audit(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    action: AuditAction,
    before: &PurchaseOrder,
    order: &PurchaseOrder,
) -> ApiResult<PurchaseOrder> {
    let stored = services.repos.orders.save(order).await?;
    services
        .audit(tenant, principal, action, tables::PURCHASE_ORDERS, stored.id, Some(before), Some(&stored))
        .await;
    Ok(stored)
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreatePurchaseOrder>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::PURCHASES_WRITE])).await?;
    let tenant_id = tenant.tenant_id();
    let now = Utc::now();

    let supplier = match services.repos.suppliers.get(tenant_id, &cmd.supplier_id).await {
        Ok(s) => s,
        Err(e) if matches!(e.to_domain(), Some(DomainError::NotFound)) => {
            return Err(DomainError::validation("supplier_id does not exist").into());
        }
        Err(e) => return Err(e.into()),
    };
    ensure_items_exist(&services, tenant_id, cmd.lines.iter().map(|l| l.item_id)).await?;

    let existing = services.repos.orders.list(tenant_id).await?;
    let po_number = next_document_number(
        DocumentKind::PurchaseOrder,
        now.date_naive(),
        existing.iter().map(|o| o.po_number.as_str()),
    );

    let author = principal.display_name();
    let mut order = PurchaseOrder::create(tenant_id, po_number, &supplier, cmd, (principal.user_id(), &author), now)?;
    let mut attempt = 1;
    let stored = loop {
        match services.repos.orders.insert(&order).await {
            Ok(stored) => break stored,
            // A concurrent create took the number; count again from what is stored now.
            Err(BackendError::Conflict(reason)) if attempt < NUMBERING_ATTEMPTS => {
                tracing::debug!(tenant_id = %tenant_id, po_number = %order.po_number, %reason, "document number taken, renumbering");
                attempt += 1;
                let existing = services.repos.orders.list(tenant_id).await?;
                order.po_number = next_document_number(
                    DocumentKind::PurchaseOrder,
                    now.date_naive(),
                    existing.iter().map(|o| o.po_number.as_str()),
                );
            }
            Err(e) => return Err(e.into()),
        }
    };
    services
        .audit(&tenant, &principal, AuditAction::Insert, tables::PURCHASE_ORDERS, stored.id, None, Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant_id, po_number = %stored.po_number, "purchase order created");

    let config = services.repos.workflows.get(tenant_id, WorkflowModule::PurchaseOrder).await?;
    common::created(dto::order_to_json(&stored, &config))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::OrderListQuery>,
) -> ApiResult {
    let (query, _) = authorized(&services, &tenant, &principal, CmdAuth::new(query, &[perms::PURCHASES_READ])).await?;
    let tenant_id = tenant.tenant_id();

    let mut backend_query = BackendQuery::new().order_desc("created_at");
    if let Some(status) = query.status {
        let status = serde_json::to_value(status).map_err(|e| DomainError::validation(e.to_string()))?;
        backend_query = backend_query.eq("status", status.as_str().unwrap_or_default());
    }
    let orders = services.repos.orders.find(tenant_id, &backend_query).await?;
    let config = services.repos.workflows.get(tenant_id, WorkflowModule::PurchaseOrder).await?;
    common::list(orders.iter().map(|o| dto::order_to_json(o, &config)).collect())
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_READ])).await?;
    let order = load_order(&services, &tenant, &id).await?;
    respond(&services, &tenant, &order).await
}

/// The reduced, per-level approval history.
pub async fn order_approvals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_READ])).await?;
    let order = load_order(&services, &tenant, &id).await?;
    common::list(order.approvals())
}

pub async fn submit_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_WRITE])).await?;
    let before = load_order(&services, &tenant, &id).await?;
    let mut order = before.clone();
    order.submit(Utc::now())?;

    let stored = save_with_audit(&services, &tenant, &principal, AuditAction::Update, &before, &order).await?;
    respond(&services, &tenant, &stored).await
}

/// Approve or reject at a level. Only the workflow's approver role may act.
pub async fn decide_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DecisionRequest>,
) -> ApiResult {
    let (req, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::PURCHASES_READ])).await?;
    let tenant_id = tenant.tenant_id();
    let now = Utc::now();

    let before = load_order(&services, &tenant, &id).await?;
    let config = services.repos.workflows.get(tenant_id, WorkflowModule::PurchaseOrder).await?;

    let mut order = before.clone();
    let decided = match order.settle(&config, now)? {
        Some(outcome) => Decided::settled(outcome),
        None => {
            let level = pending_level(req.level, &before.approval_steps, &config)?;
            let outcome = order.decide(&config, level, req.decision, &approver(&principal), req.comment, now)?;
            Decided::at(level, req.decision, outcome)
        }
    };
    let outcome = decided.outcome;

    let stored = save_with_audit(&services, &tenant, &principal, decided.action(), &before, &order).await?;
    tracing::info!(tenant_id = %tenant_id, po_number = %stored.po_number, level = ?decided.level, ?outcome, "purchase order decision recorded");

    if let Some(verdict) = decided.verdict() {
        services
            .notify(
                tenant_id,
                stored.created_by,
                NotificationKind::ApprovalDecided,
                format!("Purchase order {} {verdict}", stored.po_number),
                decided.describe(&principal),
                Some(format!("/purchases/orders/{}", stored.id)),
            )
            .await;
    }

    let mut body = dto::order_to_json(&stored, &config);
    body["outcome"] = dto::outcome_to_json(outcome);
    common::ok(body)
}

pub async fn issue_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_WRITE])).await?;
    let before = load_order(&services, &tenant, &id).await?;
    let mut order = before.clone();
    order.issue(&principal.display_name(), Utc::now())?;

    let stored = save_with_audit(&services, &tenant, &principal, AuditAction::Update, &before, &order).await?;
    respond(&services, &tenant, &stored).await
}

/// Receive goods and book every line into stock.
///
/// All stock movements are checked before anything is written.
pub async fn receive_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_RECEIVE])).await?;
    let tenant_id = tenant.tenant_id();
    let now = Utc::now();

    let before = load_order(&services, &tenant, &id).await?;
    let mut order = before.clone();
    let lines = order.receive(&principal.display_name(), now)?;

    let mut moved: Vec<(Item, Item)> = Vec::new();
    for line in &lines {
        let idx = match moved.iter().position(|(_, after)| after.id == line.item_id) {
            Some(i) => i,
            None => {
                let item = services.repos.items.get(tenant_id, &line.item_id).await?;
                moved.push((item.clone(), item));
                moved.len() - 1
            }
        };
        let cmd = AdjustStock {
            delta: line.quantity,
            reason: Some(format!("received on {}", order.po_number)),
        };
        moved[idx].1.adjust(&cmd, now)?;
    }

    // Stock is booked before the order flips to received.
    for (old, new) in &moved {
        let saved = services.repos.items.save(new).await?;
        services
            .audit(&tenant, &principal, AuditAction::Update, tables::ITEMS, saved.id, Some(old), Some(&saved))
            .await;
        notify_if_low(&services, tenant_id, &principal, old, &saved).await;
    }
    let stored = save_with_audit(&services, &tenant, &principal, AuditAction::Update, &before, &order).await?;
    tracing::info!(tenant_id = %tenant_id, po_number = %stored.po_number, lines = lines.len(), "purchase order received");
    respond(&services, &tenant, &stored).await
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::PURCHASES_WRITE])).await?;
    let before = load_order(&services, &tenant, &id).await?;
    let mut order = before.clone();
    order.cancel(Utc::now())?;

    let stored = save_with_audit(&services, &tenant, &principal, AuditAction::Update, &before, &order).await?;
    respond(&services, &tenant, &stored).await
}
