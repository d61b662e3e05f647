use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use proventory_audit::{AuditAction, AuditFilter};
use proventory_core::UserId;
use proventory_inventory::{CategoryId, Item};
use proventory_notifications::NotificationKind;
use proventory_purchasing::{
    ApprovalOutcome, Decision, PurchaseOrder, PurchaseOrderStatus, PurchaseReturn, ReturnStatus, WorkflowConfig,
    WorkflowLevel, milestones, next_pending_level,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub active: Option<bool>,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<PurchaseOrderStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnListQuery {
    pub status: Option<ReturnStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// Defaults to the next pending level.
    pub level: Option<u32>,
    pub decision: Decision,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub levels: Vec<WorkflowLevel>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub recipient: UserId,
    #[serde(default = "default_kind")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub link: Option<String>,
}

fn default_kind() -> NotificationKind {
    NotificationKind::Info
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub table: Option<String>,
    pub actor: Option<UserId>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<AuditQuery> for AuditFilter {
    fn from(q: AuditQuery) -> Self {
        AuditFilter {
            table_name: q.table.filter(|t| !t.is_empty()),
            actor: q.actor,
            action: q.action,
            from: q.from,
            to: q.to,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StageReportRequest {
    pub view: String,
    pub title: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

fn with_fields(base: impl serde::Serialize, extra: JsonValue) -> JsonValue {
    let mut value = serde_json::to_value(base).unwrap_or(JsonValue::Null);
    if let (Some(obj), JsonValue::Object(extra)) = (value.as_object_mut(), extra) {
        obj.extend(extra);
    }
    value
}

pub fn item_to_json(item: &Item) -> JsonValue {
    with_fields(
        item,
        json!({
            "stock_status": item.stock_status(),
            "stock_value": item.stock_value(),
        }),
    )
}

/// Order with its reduced approval view and where it stands in `config`.
pub fn order_to_json(order: &PurchaseOrder, config: &WorkflowConfig) -> JsonValue {
    with_fields(
        order,
        json!({
            "total": order.total(),
            "approvals": order.approvals(),
            "milestones": milestones(&order.approval_steps),
            "next_level": pending_level(order.status == PurchaseOrderStatus::PendingApproval, &order.approval_steps, config),
        }),
    )
}

pub fn return_to_json(ret: &PurchaseReturn, config: &WorkflowConfig) -> JsonValue {
    with_fields(
        ret,
        json!({
            "approvals": ret.approvals(),
            "milestones": milestones(&ret.approval_steps),
            "next_level": pending_level(ret.status == ReturnStatus::PendingApproval, &ret.approval_steps, config),
        }),
    )
}

fn pending_level(
    pending: bool,
    steps: &[proventory_purchasing::ApprovalStep],
    config: &WorkflowConfig,
) -> Option<u32> {
    if pending { next_pending_level(steps, config) } else { None }
}

pub fn outcome_to_json(outcome: ApprovalOutcome) -> JsonValue {
    serde_json::to_value(outcome).unwrap_or(JsonValue::Null)
}
